// 模块声明
mod command;
mod inventory;
mod manager;
mod runtime;
mod types;

// 重新导出公共API
pub use inventory::take_inventory;
pub use runtime::ContainerRuntime;
pub use types::{DockerCli, Workload, WorkloadId};
