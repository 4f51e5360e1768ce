use crate::app::CliApp;
use crate::utils::format_size;
use anyhow::Result;
use backup_core::constants::backup;
use backup_core::retention::scan_runs;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// 单个备份目录的概况
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub archive_count: usize,
    pub has_primary: bool,
}

/// 汇总备份根目录下的所有运行目录，按时间升序
pub fn collect_runs(backup_dir: &Path) -> Result<Vec<RunSummary>> {
    let mut summaries = Vec::new();

    for run in scan_runs(backup_dir)? {
        let mut size_bytes = 0;
        let mut archive_count = 0;
        for entry in WalkDir::new(&run.path).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            size_bytes += entry.metadata()?.len();
            if entry
                .file_name()
                .to_string_lossy()
                .ends_with(backup::ARCHIVE_EXTENSION)
            {
                archive_count += 1;
            }
        }

        summaries.push(RunSummary {
            has_primary: run.path.join(backup::PRIMARY_ARCHIVE_NAME).exists(),
            name: run.name,
            path: run.path,
            size_bytes,
            archive_count,
        });
    }

    Ok(summaries)
}

/// 列出所有备份
pub fn run_list(app: &CliApp) -> Result<()> {
    let backup_dir = &app.config.paths.backup_dir;
    let runs = collect_runs(backup_dir)?;

    if runs.is_empty() {
        info!("📦 {} 下暂无备份", backup_dir.display());
        return Ok(());
    }

    info!("📦 备份列表 ({})", backup_dir.display());
    info!("{:<4} {:<22} {:>12} {:>6}  主数据", "序号", "时间", "大小", "归档");
    for (index, run) in runs.iter().enumerate() {
        info!(
            "{:<4} {:<22} {:>12} {:>6}  {}",
            index + 1,
            run.name,
            format_size(run.size_bytes),
            run.archive_count,
            if run.has_primary { "✅" } else { "❌" }
        );
    }

    let total: u64 = runs.iter().map(|r| r.size_bytes).sum();
    info!(
        "共 {} 个备份，总大小 {}，保留上限 {}",
        runs.len(),
        format_size(total),
        app.config.retention.max_backups
    );

    Ok(())
}
