use crate::constants::backup;
use crate::container::{ContainerRuntime, Workload};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// 配置快照阶段结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotReport {
    /// 写入暂存目录的快照文件
    pub files: Vec<PathBuf>,
    /// 获取或写入失败的容器及原因
    pub failed: Vec<(String, String)>,
}

/// 快照文件名：`<容器名>_config.json`，名称中的路径分隔符等字符替换为下划线
pub fn snapshot_file_name(workload_name: &str) -> String {
    let sanitized: String = workload_name
        .trim_start_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}", sanitized, backup::CONFIG_SNAPSHOT_SUFFIX)
}

/// 在停止任何容器之前，把每个运行中容器的 inspect 输出写入暂存目录
///
/// 单个容器失败只记录日志，该容器的配置不会出现在归档中
#[instrument(skip_all, fields(count = workloads.len()))]
pub async fn capture_config_snapshots(
    runtime: &dyn ContainerRuntime,
    workloads: &[Workload],
    staging_dir: &Path,
) -> SnapshotReport {
    let mut report = SnapshotReport::default();

    for workload in workloads {
        info!(
            "📝 备份容器配置: {} ({})",
            workload.name,
            workload.id.short()
        );

        let descriptor = match runtime.inspect(&workload.id).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("⚠️  获取容器 {} 配置失败: {}", workload.name, e);
                report.failed.push((workload.name.clone(), e.to_string()));
                continue;
            }
        };

        let path = staging_dir.join(snapshot_file_name(&workload.name));
        match tokio::fs::write(&path, &descriptor).await {
            Ok(()) => report.files.push(path),
            Err(e) => {
                warn!("⚠️  写入容器 {} 配置失败: {}", workload.name, e);
                report.failed.push((workload.name.clone(), e.to_string()));
            }
        }
    }

    info!(
        "配置快照完成: {} 成功, {} 失败",
        report.files.len(),
        report.failed.len()
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRuntime, RuntimeEvent};
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_file_name() {
        assert_eq!(snapshot_file_name("mosquitto"), "mosquitto_config.json");
        assert_eq!(snapshot_file_name("/web"), "web_config.json");
        assert_eq!(snapshot_file_name("a/b c"), "a_b_c_config.json");
    }

    #[tokio::test]
    async fn test_snapshots_written_per_workload() {
        let dir = tempdir().unwrap();
        let runtime = FakeRuntime::new(&["a", "b"]);
        let workloads = runtime.workloads();

        let report = capture_config_snapshots(&runtime, &workloads, dir.path()).await;

        assert_eq!(report.files.len(), 2);
        assert!(report.failed.is_empty());
        let content = std::fs::read_to_string(dir.path().join("a_config.json")).unwrap();
        assert!(content.contains("\"a\""));
        // 快照阶段不会停止任何容器
        assert!(
            runtime
                .events()
                .iter()
                .all(|e| matches!(e, RuntimeEvent::Inspect(_)))
        );
    }

    #[tokio::test]
    async fn test_inspect_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let runtime = FakeRuntime::new(&["a", "b", "c"]);
        runtime.fail_inspect("b");
        let workloads = runtime.workloads();

        let report = capture_config_snapshots(&runtime, &workloads, dir.path()).await;

        assert_eq!(report.files.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b");
        assert!(!dir.path().join("b_config.json").exists());
        assert!(dir.path().join("c_config.json").exists());
    }
}
