// 私有模块声明
mod app;
mod cli;
mod commands;
mod init;
mod utils;

// 通过 pub use 精确控制对外暴露的接口
pub use app::CliApp;
pub use cli::{Cli, Commands};
pub use commands::{RunSummary, collect_runs, preview_prune};
pub use init::run_init;
pub use utils::{LOG_FILE_ENV, format_size, setup_logging};
