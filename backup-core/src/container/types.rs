use serde::{Deserialize, Serialize};
use std::fmt;

/// 运行时分配的容器标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadId(pub String);

impl WorkloadId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 截断后的短 ID，仅用于日志展示
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        self.0.get(..end).unwrap_or(&self.0)
    }
}

impl fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkloadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 一次盘点时看到的容器
///
/// 只在单次运行的内存中存在，容器运行时才是真实状态来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub id: WorkloadId,
    pub name: String,
    pub running: bool,
}

impl Workload {
    pub fn running(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: WorkloadId(id.into()),
            name: name.into(),
            running: true,
        }
    }
}

/// Docker 运行时
#[derive(Debug, Clone)]
pub struct DockerCli {
    pub(crate) binary: String,
}
