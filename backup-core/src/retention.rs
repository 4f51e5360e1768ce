use crate::run::parse_timestamp;
use crate::{BackupError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

/// 备份根目录下的一个运行目录
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RunEntry {
    pub name: String,
    pub path: PathBuf,
}

/// 按名称（即时间）升序列出所有运行目录
///
/// 只有名称是合法时间戳的目录才计入，日志文件、锁文件等其它条目永远不会被清理
pub fn scan_runs(base_dir: &Path) -> Result<Vec<RunEntry>> {
    if !base_dir.exists() {
        return Ok(Vec::new());
    }

    let mut runs = Vec::new();
    for entry in std::fs::read_dir(base_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if parse_timestamp(&name).is_none() {
            continue;
        }
        runs.push(RunEntry {
            name,
            path: entry.path(),
        });
    }

    runs.sort();
    Ok(runs)
}

/// 计算需要删除的运行目录：最旧的若干个，使剩余数量不超过 `max_backups`
///
/// `protect` 指向的目录（当前运行）不会被选中
pub fn plan_prune(runs: &[RunEntry], max_backups: usize, protect: Option<&Path>) -> Vec<RunEntry> {
    let excess = runs.len().saturating_sub(max_backups);
    runs.iter()
        .filter(|run| protect != Some(run.path.as_path()))
        .take(excess)
        .cloned()
        .collect()
}

/// 保留清理结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetentionReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub remaining: usize,
}

impl RetentionReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 删除超出保留数量的最旧运行目录
#[instrument(skip(protect))]
pub async fn prune(
    base_dir: &Path,
    max_backups: usize,
    protect: Option<&Path>,
) -> Result<RetentionReport> {
    if max_backups == 0 {
        return Err(BackupError::retention("保留数量必须大于 0"));
    }

    let runs = scan_runs(base_dir)?;
    let victims = plan_prune(&runs, max_backups, protect);
    let mut report = RetentionReport::default();

    if victims.is_empty() {
        info!("🗂️  当前共 {} 个备份，无需清理 (上限 {})", runs.len(), max_backups);
        report.remaining = runs.len();
        return Ok(report);
    }

    info!(
        "🗂️  当前共 {} 个备份，超过上限 {}，删除最旧的 {} 个",
        runs.len(),
        max_backups,
        victims.len()
    );

    for victim in victims {
        match tokio::fs::remove_dir_all(&victim.path).await {
            Ok(()) => {
                info!("🗑️  已删除旧备份: {}", victim.name);
                report.removed.push(victim.path);
            }
            Err(e) => {
                error!("❌ 删除旧备份 {} 失败: {}", victim.name, e);
                report.failed.push((victim.path, e.to_string()));
            }
        }
    }

    report.remaining = runs.len() - report.removed.len();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_runs(base: &Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = base.join(format!("2024-01-{:02}-02-00-00", i + 1));
                std::fs::create_dir_all(&path).unwrap();
                std::fs::write(path.join("docker_backup.tar.gz"), b"x").unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_scan_ignores_non_run_entries() {
        let dir = tempdir().unwrap();
        make_runs(dir.path(), 2);
        std::fs::write(dir.path().join("backup_log.txt"), b"log").unwrap();
        std::fs::create_dir(dir.path().join("manual-copy")).unwrap();
        std::fs::write(dir.path().join("2024-02-01-00-00-00"), b"a file").unwrap();

        let runs = scan_runs(dir.path()).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].name, "2024-01-01-02-00-00");
    }

    #[test]
    fn test_scan_missing_base_is_empty() {
        assert!(scan_runs(Path::new("/nonexistent/backups")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prune_removes_exactly_the_oldest() {
        let dir = tempdir().unwrap();
        let runs = make_runs(dir.path(), 10);
        std::fs::write(dir.path().join("backup_log.txt"), b"log").unwrap();

        let report = prune(dir.path(), 8, Some(&runs[9])).await.unwrap();

        assert_eq!(report.removed, vec![runs[0].clone(), runs[1].clone()]);
        assert_eq!(report.remaining, 8);
        assert!(report.is_clean());
        assert_eq!(scan_runs(dir.path()).unwrap().len(), 8);
        assert!(!runs[0].exists());
        assert!(runs[2].exists());
        assert!(dir.path().join("backup_log.txt").exists());
    }

    #[tokio::test]
    async fn test_prune_within_limit_is_noop() {
        let dir = tempdir().unwrap();
        make_runs(dir.path(), 3);

        let report = prune(dir.path(), 8, None).await.unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(report.remaining, 3);
    }

    #[test]
    fn test_plan_never_selects_protected_run() {
        let dir = tempdir().unwrap();
        let paths = make_runs(dir.path(), 4);
        let runs = scan_runs(dir.path()).unwrap();

        // 当前运行目录按名称排在最前（例如时钟回拨）时仍然受保护
        let victims = plan_prune(&runs, 2, Some(&paths[0]));
        assert_eq!(victims.len(), 2);
        assert!(victims.iter().all(|v| v.path != paths[0]));
        assert_eq!(victims[0].path, paths[1]);
    }

    #[tokio::test]
    async fn test_zero_max_is_rejected() {
        let dir = tempdir().unwrap();
        assert!(prune(dir.path(), 0, None).await.is_err());
    }
}
