//! 异地同步
//!
//! 通过 rclone 把完成的运行目录和备份日志复制到远程目标。
//! rclone 的退出码是首选的成功判断依据；只有拿不到退出码时才退回到
//! 在输出中查找失败标记，这个信号既可能误报也可能漏报。

use crate::constants::command;
use crate::run::BackupRun;
use crate::{BackupError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

/// 一次远程复制的原始结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutput {
    /// 结构化的退出状态，工具无法提供时为 None
    pub exit_success: Option<bool>,
    /// stdout + stderr 合并文本
    pub output: String,
}

/// 远程同步能力
#[async_trait]
pub trait RemoteSync: Send + Sync {
    async fn copy(&self, local: &Path, remote: &str) -> Result<SyncOutput>;
}

/// 上传状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Skipped,
    Success,
    Failure,
}

impl UploadStatus {
    pub fn glyph(&self) -> &'static str {
        match self {
            UploadStatus::Skipped => "⚠️ 已跳过",
            UploadStatus::Success => "✅",
            UploadStatus::Failure => "❌",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UploadStatus::Skipped => "skipped",
            UploadStatus::Success => "success",
            UploadStatus::Failure => "failure",
        };
        f.write_str(text)
    }
}

/// 根据复制结果判断是否成功
pub fn classify_sync(output: &SyncOutput) -> UploadStatus {
    let success = match output.exit_success {
        Some(success) => success,
        None => !output.output.contains(command::RCLONE_FAILURE_MARKER),
    };

    if success {
        UploadStatus::Success
    } else {
        UploadStatus::Failure
    }
}

/// 拼接远程路径，兼容 `remote:` 和 `remote:dir/` 两种写法
pub fn remote_join(base: &str, segment: &str) -> String {
    let segment = segment.trim_start_matches('/');
    if base.is_empty() {
        segment.to_string()
    } else if base.ends_with('/') || base.ends_with(':') {
        format!("{base}{segment}")
    } else {
        format!("{base}/{segment}")
    }
}

/// 基于 rclone 命令行的远程同步
#[derive(Debug, Clone)]
pub struct RcloneSync {
    binary: String,
}

impl RcloneSync {
    pub fn new() -> Self {
        Self {
            binary: command::RCLONE_BIN.to_string(),
        }
    }

    /// 检查 rclone 是否可用
    pub fn check_available(&self) -> Result<()> {
        which::which(&self.binary)
            .map(|_| ())
            .map_err(|_| BackupError::sync(format!("{} 未安装或不在 PATH 中", self.binary)))
    }
}

impl Default for RcloneSync {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteSync for RcloneSync {
    async fn copy(&self, local: &Path, remote: &str) -> Result<SyncOutput> {
        debug!("执行: {} copy {} {}", self.binary, local.display(), remote);

        let output = Command::new(&self.binary)
            .arg("copy")
            .arg(local)
            .arg(remote)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BackupError::sync(format!("无法执行 {}: {e}", self.binary)))?;

        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(SyncOutput {
            exit_success: Some(output.status.success()),
            output: text,
        })
    }
}

/// 把运行目录复制到 `<destination>/<timestamp>`，并把备份日志镜像到远程根目录
#[instrument(skip_all, fields(timestamp = %run.timestamp))]
pub async fn replicate_run(
    sync: &dyn RemoteSync,
    run: &BackupRun,
    destination: &str,
    log_file: &Path,
) -> UploadStatus {
    let remote_dir = remote_join(destination, &run.timestamp);
    info!("☁️  开始同步到远程: {}", remote_dir);

    let status = match sync.copy(&run.final_dir, &remote_dir).await {
        Ok(output) => {
            let status = classify_sync(&output);
            if status == UploadStatus::Failure {
                error!("❌ 远程同步失败: {}", output.output.trim());
            } else {
                info!("✅ 远程同步完成");
            }
            status
        }
        Err(e) => {
            error!("❌ 远程同步失败: {}", e);
            UploadStatus::Failure
        }
    };

    if log_file.exists() {
        match sync.copy(log_file, destination).await {
            Ok(output) if classify_sync(&output) == UploadStatus::Success => {
                debug!("备份日志已同步到远程");
            }
            Ok(output) => warn!("⚠️  备份日志同步失败: {}", output.output.trim()),
            Err(e) => warn!("⚠️  备份日志同步失败: {}", e),
        }
    }

    status
}
