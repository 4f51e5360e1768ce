use backup_cli::{Cli, CliApp, Commands, run_init, setup_logging};
use backup_core::BackupError;
use backup_core::constants::config;
use clap::Parser;
use std::path::PathBuf;
use tracing::error;

#[tokio::main]
async fn main() {
    // 解析命令行参数
    let cli = Cli::parse();

    // 设置日志记录，guard 需要持有到进程结束
    let _log_guard = setup_logging(cli.verbose);

    // `init` 命令是特例，它不需要预先加载配置
    if let Commands::Init { force } = cli.command {
        let path = cli
            .config
            .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_FILE));
        if let Err(e) = run_init(&path, force) {
            error!("❌ 初始化失败: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let app = match CliApp::new(cli.config.as_deref()) {
        Ok(app) => app,
        Err(e) => {
            let is_config_not_found = e
                .chain()
                .any(|cause| matches!(cause.downcast_ref::<BackupError>(), Some(BackupError::ConfigNotFound)));

            if is_config_not_found {
                match &cli.config {
                    Some(path) => error!("❌ 配置文件 '{}' 未找到。", path.display()),
                    None => error!(
                        "❌ 未找到配置文件（{}）。",
                        config::CONFIG_FILE_CANDIDATES.join(", ")
                    ),
                }
                error!("👉 请先运行 'docker-backup init' 命令来创建配置文件。");
            } else {
                error!("❌ 应用初始化失败: {}", e);
            }
            std::process::exit(1);
        }
    };

    // 运行命令
    if let Err(e) = app.run_command(cli.command).await {
        error!("❌ 操作失败: {:#}", e);
        std::process::exit(1);
    }
}
