use super::types::{Workload, WorkloadId};
use crate::Result;
use async_trait::async_trait;

/// 容器运行时能力
///
/// 编排流程只依赖这几个操作，具体实现可以是 docker 命令行，也可以是测试替身
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// 列出当前正在运行的容器，顺序与运行时返回一致
    async fn list_running(&self) -> Result<Vec<Workload>>;

    /// 获取容器的运行时描述（inspect 输出）
    async fn inspect(&self, id: &WorkloadId) -> Result<Vec<u8>>;

    async fn stop(&self, id: &WorkloadId) -> Result<()>;

    async fn start(&self, name: &str) -> Result<()>;

    async fn is_running(&self, name: &str) -> Result<bool>;
}
