use super::runtime::ContainerRuntime;
use super::types::Workload;
use crate::{BackupError, Result};
use std::collections::HashSet;
use tracing::{info, warn};

/// 盘点当前运行中的容器
///
/// 运行时不可达时返回错误，调用方必须在任何破坏性操作之前终止本次运行
pub async fn take_inventory(runtime: &dyn ContainerRuntime) -> Result<Vec<Workload>> {
    let workloads = runtime
        .list_running()
        .await
        .map_err(|e| BackupError::runtime(format!("无法获取运行中的容器列表: {e}")))?;

    // 同名容器只保留第一次出现的条目
    let mut seen = HashSet::new();
    let workloads: Vec<Workload> = workloads
        .into_iter()
        .filter(|w| w.running)
        .filter(|w| {
            let fresh = seen.insert(w.name.clone());
            if !fresh {
                warn!("⚠️  忽略重复的容器名称: {} ({})", w.name, w.id.short());
            }
            fresh
        })
        .collect();

    if workloads.is_empty() {
        warn!("⚠️  当前没有运行中的容器");
    } else {
        info!(
            "🐳 发现 {} 个运行中的容器: {:?}",
            workloads.len(),
            workloads.iter().map(|w| w.name.as_str()).collect::<Vec<_>>()
        );
    }

    Ok(workloads)
}
