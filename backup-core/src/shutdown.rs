use crate::container::{ContainerRuntime, Workload};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// 停止阶段结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShutdownReport {
    pub stopped: Vec<String>,
    /// 被排除（未停止）的自身容器
    pub excluded: Option<String>,
    pub failed: Vec<(String, String)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 按盘点顺序依次停止容器，跳过自身容器
///
/// 单个容器停止失败不影响其它容器
#[instrument(skip_all, fields(count = workloads.len()))]
pub async fn stop_workloads(
    runtime: &dyn ContainerRuntime,
    workloads: &[Workload],
    self_exclusion: Option<&str>,
) -> ShutdownReport {
    let mut report = ShutdownReport::default();

    match self_exclusion {
        Some(name) => info!(
            "⏹️  正在停止 {} 个容器，排除 {}...",
            workloads.iter().filter(|w| w.name != name).count(),
            name
        ),
        None => {
            warn!("⚠️  未配置 restart.self_container，如果本工具运行在容器中可能会停止自身");
            info!("⏹️  正在停止 {} 个容器...", workloads.len());
        }
    }

    for workload in workloads {
        if self_exclusion == Some(workload.name.as_str()) {
            report.excluded = Some(workload.name.clone());
            continue;
        }

        info!("停止容器 {} ({})...", workload.name, workload.id.short());
        match runtime.stop(&workload.id).await {
            Ok(()) => report.stopped.push(workload.name.clone()),
            Err(e) => {
                warn!("⚠️  停止容器 {} 失败，继续: {}", workload.name, e);
                report.failed.push((workload.name.clone(), e.to_string()));
            }
        }
    }

    report
}
