use crate::archive::ArchiveReport;
use crate::replication::UploadStatus;
use crate::restart::RestartReport;
use crate::retention::RetentionReport;
use crate::shutdown::ShutdownReport;
use crate::snapshot::SnapshotReport;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 阶段结果等级，按严重程度排序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    Degraded,
    Fatal,
}

impl StageStatus {
    pub fn from_clean(clean: bool) -> Self {
        if clean {
            StageStatus::Success
        } else {
            StageStatus::Degraded
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            StageStatus::Success => "✅",
            StageStatus::Degraded => "⚠️",
            StageStatus::Fatal => "❌",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Inventory,
    ConfigSnapshot,
    Shutdown,
    Archive,
    Restart,
    Replication,
    Retention,
    Notification,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Inventory => "容器盘点",
            Stage::ConfigSnapshot => "配置快照",
            Stage::Shutdown => "停止容器",
            Stage::Archive => "归档",
            Stage::Restart => "重启容器",
            Stage::Replication => "远程同步",
            Stage::Retention => "保留清理",
            Stage::Notification => "推送通知",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,
    pub detail: Option<String>,
}

/// 一次运行的结构化结果
///
/// 核心逻辑只产生字段，文本只在通知和日志边界渲染
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub final_dir: PathBuf,
    /// 备份前运行中的容器数量
    pub workload_count: usize,
    pub snapshot: SnapshotReport,
    pub shutdown: ShutdownReport,
    pub archive: ArchiveReport,
    pub restart: RestartReport,
    pub upload: UploadStatus,
    pub retention: Option<RetentionReport>,
    /// 运行目录中所有文件的总字节数
    pub total_bytes: u64,
    pub stages: Vec<StageOutcome>,
}

impl RunReport {
    pub fn record(&mut self, stage: Stage, status: StageStatus, detail: Option<String>) {
        self.stages.push(StageOutcome {
            stage,
            status,
            detail,
        });
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// 所有阶段中最严重的等级
    pub fn overall(&self) -> StageStatus {
        self.stages
            .iter()
            .map(|s| s.status)
            .max()
            .unwrap_or(StageStatus::Success)
    }

    pub fn primary_archive_failed(&self) -> bool {
        self.archive.primary_failed()
    }
}

fn serialize_secs<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// 格式化耗时为 `H:MM:SS`
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
