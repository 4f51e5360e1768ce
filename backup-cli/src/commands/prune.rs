use crate::app::CliApp;
use anyhow::{Result, bail};
use backup_core::retention::{self, RunEntry, plan_prune, scan_runs};
use std::path::Path;
use tracing::{info, warn};

/// 只计算将被删除的备份
pub fn preview_prune(backup_dir: &Path, max_backups: usize) -> Result<Vec<RunEntry>> {
    if max_backups == 0 {
        bail!("保留数量必须大于 0");
    }
    let runs = scan_runs(backup_dir)?;
    Ok(plan_prune(&runs, max_backups, None))
}

/// 按保留数量清理旧备份
pub async fn run_prune(app: &CliApp, max: Option<usize>, dry_run: bool) -> Result<()> {
    let max_backups = max.unwrap_or(app.config.retention.max_backups);
    let backup_dir = &app.config.paths.backup_dir;

    if dry_run {
        let victims = preview_prune(backup_dir, max_backups)?;
        if victims.is_empty() {
            info!("🗂️  备份数量未超过上限 {}，无需清理", max_backups);
        } else {
            info!("🔍 以下 {} 个备份将被删除 (上限 {}):", victims.len(), max_backups);
            for victim in &victims {
                info!("   - {}", victim.name);
            }
        }
        return Ok(());
    }

    let report = retention::prune(backup_dir, max_backups, None).await?;
    for (path, error) in &report.failed {
        warn!("⚠️  未能删除 {}: {}", path.display(), error);
    }
    info!(
        "✅ 清理完成: 删除 {} 个，剩余 {} 个",
        report.removed.len(),
        report.remaining
    );

    if !report.is_clean() {
        bail!("部分旧备份删除失败");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_preview_does_not_delete() {
        let dir = tempdir().unwrap();
        for day in 1..=5 {
            std::fs::create_dir_all(dir.path().join(format!("2024-04-{day:02}-02-00-00"))).unwrap();
        }

        let victims = preview_prune(dir.path(), 3).unwrap();

        let names: Vec<_> = victims.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["2024-04-01-02-00-00", "2024-04-02-02-00-00"]);
        assert_eq!(scan_runs(dir.path()).unwrap().len(), 5);
    }

    #[test]
    fn test_preview_rejects_zero() {
        let dir = tempdir().unwrap();
        assert!(preview_prune(dir.path(), 0).is_err());
    }
}
