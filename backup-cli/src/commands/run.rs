use crate::app::CliApp;
use crate::utils::format_size;
use anyhow::{Result, bail};
use backup_core::pipeline::{BackupPipeline, Capabilities};
use backup_core::replication::RcloneSync;
use backup_core::report::{RunReport, StageStatus, format_elapsed};
use tracing::{info, warn};

/// 执行一次完整备份
///
/// 降级结果正常返回；主数据归档失败时返回错误，进程以非零状态退出
pub async fn run_backup(app: &CliApp, json: bool) -> Result<()> {
    info!("💾 Docker 备份");
    info!("===============");

    if app.config.remote_destination().is_some() {
        if let Err(e) = RcloneSync::new().check_available() {
            warn!("⚠️  {}，本次远程同步将失败", e);
        }
    }

    let caps = Capabilities::from_config(&app.config)?;
    let report = BackupPipeline::new(&app.config, caps).run().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if report.overall() == StageStatus::Fatal {
        bail!("主数据归档失败，本次备份不完整: {}", report.final_dir.display());
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    info!("📋 运行摘要");
    info!("   时间戳: {}", report.timestamp);
    info!("   目录: {}", report.final_dir.display());
    info!("   耗时: {}", format_elapsed(report.elapsed));
    info!("   大小: {}", format_size(report.total_bytes));
    info!("   容器数量: {}", report.workload_count);
    info!("   上传状态: {}", report.upload.glyph());

    for artifact in &report.archive.artifacts {
        info!("   📦 {} ({})", artifact.name, format_size(artifact.size_bytes));
    }
    for failure in &report.archive.failures {
        warn!("   ❌ {}: {}", failure.source.display(), failure.error);
    }
    for outcome in report.restart.degraded() {
        warn!("   ⚠️  容器 {} 未确认运行: {:?}", outcome.name, outcome.state);
    }
}
