//! 备份流水线
//!
//! 盘点 -> 配置快照 -> 停止 -> 归档 -> 重启 / 远程同步 -> 保留清理 -> 通知
//!
//! 只有盘点失败、运行目录无法创建、已有实例在运行时直接返回错误；
//! 其余阶段的失败都记录在 [`RunReport`] 中，流水线继续执行，保证容器总会被重新启动。

use crate::archive::{ArchiveKind, ArchiveProducer, ArchiveReport, Archiver, TarGzArchiver};
use crate::backup_log::{BackupLog, LogMirror};
use crate::config::AppConfig;
use crate::container::{ContainerRuntime, DockerCli, Workload, take_inventory};
use crate::lock::RunLock;
use crate::notify::{Notifier, PushoverNotifier, dispatch, render_summary};
use crate::replication::{RcloneSync, RemoteSync, UploadStatus, replicate_run};
use crate::report::{RunReport, Stage, StageStatus};
use crate::restart::{RestartController, RestartPlan};
use crate::retention;
use crate::run::{BackupRun, directory_size};
use crate::shutdown::stop_workloads;
use crate::snapshot::capture_config_snapshots;
use crate::Result;
use chrono::Local;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};


/// 流水线依赖的外部能力
#[derive(Clone)]
pub struct Capabilities {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub archiver: Arc<dyn Archiver>,
    pub sync: Arc<dyn RemoteSync>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl Capabilities {
    /// 按配置构造生产环境适配器：docker CLI、tar.gz、rclone、Pushover
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let notifier: Option<Arc<dyn Notifier>> = match config.notify_credentials() {
            Some(credentials) => Some(Arc::new(PushoverNotifier::new(credentials)?)),
            None => None,
        };

        Ok(Self {
            runtime: Arc::new(DockerCli::new()),
            archiver: Arc::new(TarGzArchiver::new(config.archive.compression_level)),
            sync: Arc::new(RcloneSync::new()),
            notifier,
        })
    }
}

/// 一次备份运行的编排器
pub struct BackupPipeline<'a> {
    config: &'a AppConfig,
    caps: Capabilities,
}

impl<'a> BackupPipeline<'a> {
    pub fn new(config: &'a AppConfig, caps: Capabilities) -> Self {
        Self { config, caps }
    }

    /// 执行完整的备份流程
    #[instrument(skip_all)]
    pub async fn run(&self) -> Result<RunReport> {
        let _lock = RunLock::acquire(&self.config.lock_file_path())?;
        let started_at = Local::now();
        let started = Instant::now();
        info!("🚀 开始备份...");

        // 盘点失败时还没有任何副作用，直接返回
        let workloads = take_inventory(self.caps.runtime.as_ref()).await?;
        let run = BackupRun::create(self.config, started_at, started).await?;

        let report = self.run_stages(&run, &workloads).await;
        run.cleanup_staging().await;

        log_outcome(&report);
        Ok(report)
    }

    async fn run_stages(&self, run: &BackupRun, workloads: &[Workload]) -> RunReport {
        let runtime = self.caps.runtime.as_ref();
        let restart_config = &self.config.restart;
        let self_exclusion = restart_config.self_exclusion();
        let destination = self.config.remote_destination();

        // 配置快照必须在停止之前获取
        let snapshot = capture_config_snapshots(runtime, workloads, &run.staging_dir).await;
        let shutdown = stop_workloads(runtime, workloads, self_exclusion).await;

        let log = BackupLog::new(
            self.config.log_file_path(),
            destination.map(|d| LogMirror {
                sync: self.caps.sync.clone(),
                destination: d.to_string(),
            }),
        );
        let archive = ArchiveProducer::new(self.caps.archiver.as_ref(), &log)
            .produce(
                run,
                &self.config.paths.data_dir,
                &snapshot.files,
                &self.config.paths.additional_dirs,
            )
            .await;

        // 重启与远程同步互不依赖，同时进行
        let previously_running: Vec<String> = workloads
            .iter()
            .filter(|w| self_exclusion != Some(w.name.as_str()))
            .map(|w| w.name.clone())
            .collect();
        let plan = RestartPlan::build(&restart_config.priority, &previously_running);
        let controller = RestartController::new(
            runtime,
            restart_config.poll_interval(),
            restart_config.confirm_timeout(),
        );

        let replicate = async {
            match destination {
                Some(destination) => {
                    replicate_run(self.caps.sync.as_ref(), run, destination, log.path()).await
                }
                None => {
                    info!("未配置远程目标，跳过远程同步");
                    UploadStatus::Skipped
                }
            }
        };
        let (restart, upload) = tokio::join!(controller.execute(&plan), replicate);

        let retention = match retention::prune(
            &self.config.paths.backup_dir,
            self.config.retention.max_backups,
            Some(&run.final_dir),
        )
        .await
        {
            Ok(report) => Some(report),
            Err(e) => {
                error!("❌ 保留清理失败: {}", e);
                None
            }
        };

        let final_dir = run.final_dir.clone();
        let total_bytes = tokio::task::spawn_blocking(move || directory_size(&final_dir))
            .await
            .unwrap_or_default();

        let mut report = RunReport {
            timestamp: run.timestamp.clone(),
            started_at: run.started_at,
            finished_at: Local::now(),
            elapsed: run.elapsed(),
            final_dir: run.final_dir.clone(),
            workload_count: workloads.len(),
            snapshot,
            shutdown,
            archive,
            restart,
            upload,
            retention,
            total_bytes,
            stages: Vec::new(),
        };
        record_stages(&mut report);

        let message = render_summary(&report);
        let notifier = self.caps.notifier.as_deref();
        let configured = notifier.is_some();
        let sent = dispatch(notifier, &message).await;
        let (status, detail) = match (configured, sent) {
            (false, _) => (StageStatus::Success, Some("未配置".to_string())),
            (true, true) => (StageStatus::Success, None),
            (true, false) => (StageStatus::Degraded, Some("推送失败".to_string())),
        };
        report.record(Stage::Notification, status, detail);

        report
    }
}

fn record_stages(report: &mut RunReport) {
    let workload_count = report.workload_count;
    report.record(
        Stage::Inventory,
        StageStatus::Success,
        Some(format!("{workload_count} 个运行中容器")),
    );

    let snapshot_status = StageStatus::from_clean(report.snapshot.failed.is_empty());
    let snapshot_detail = join_names(report.snapshot.failed.iter().map(|(name, _)| name));
    report.record(Stage::ConfigSnapshot, snapshot_status, snapshot_detail);

    let shutdown_status = StageStatus::from_clean(report.shutdown.is_clean());
    let shutdown_detail = join_names(report.shutdown.failed.iter().map(|(name, _)| name));
    report.record(Stage::Shutdown, shutdown_status, shutdown_detail);

    let (archive_status, archive_detail) = archive_outcome(&report.archive);
    report.record(Stage::Archive, archive_status, archive_detail);

    let restart_status = StageStatus::from_clean(report.restart.is_clean());
    let restart_detail = join_names(report.restart.degraded().into_iter().map(|r| &r.name));
    report.record(Stage::Restart, restart_status, restart_detail);

    let upload = report.upload;
    let upload_status = StageStatus::from_clean(upload != UploadStatus::Failure);
    report.record(Stage::Replication, upload_status, Some(upload.to_string()));

    let (retention_status, retention_detail) = match &report.retention {
        Some(retention) => (
            StageStatus::from_clean(retention.is_clean()),
            Some(format!(
                "删除 {} 个，保留 {} 个",
                retention.removed.len(),
                retention.remaining
            )),
        ),
        None => (StageStatus::Degraded, Some("清理失败".to_string())),
    };
    report.record(Stage::Retention, retention_status, retention_detail);
}

fn archive_outcome(archive: &ArchiveReport) -> (StageStatus, Option<String>) {
    if archive.primary_failed() {
        return (StageStatus::Fatal, Some("主数据归档失败".to_string()));
    }
    let additional = archive
        .failures
        .iter()
        .filter(|f| f.kind == ArchiveKind::Additional);
    match join_names(additional.map(|f| &f.name)) {
        Some(names) => (StageStatus::Degraded, Some(names)),
        None => (
            StageStatus::Success,
            Some(format!("{} 个归档", archive.artifacts.len())),
        ),
    }
}

fn join_names<'s>(names: impl Iterator<Item = &'s String>) -> Option<String> {
    let names: Vec<&str> = names.map(String::as_str).collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

fn log_outcome(report: &RunReport) {
    for outcome in &report.stages {
        let detail = outcome.detail.as_deref().unwrap_or("");
        match outcome.status {
            StageStatus::Success => info!("{} {} {}", outcome.status.glyph(), outcome.stage, detail),
            _ => warn!("{} {} {}", outcome.status.glyph(), outcome.stage, detail),
        }
    }

    match report.overall() {
        StageStatus::Success => info!("🎉 备份完成: {}", report.final_dir.display()),
        StageStatus::Degraded => warn!("⚠️  备份完成但有部分失败: {}", report.final_dir.display()),
        StageStatus::Fatal => error!("❌ 备份失败: {}", report.final_dir.display()),
    }
}
