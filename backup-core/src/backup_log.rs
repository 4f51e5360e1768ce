use crate::Result;
use crate::constants::units;
use crate::replication::{RemoteSync, UploadStatus, classify_sync, remote_join};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// 备份日志中的一条记录，每个归档一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub size_bytes: u64,
    pub local_path: PathBuf,
    pub cloud_path: Option<String>,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Date: {}, Size: {:.2} MB, Local Path: {}",
            self.timestamp,
            units::bytes_to_mb(self.size_bytes),
            self.local_path.display()
        )?;
        if let Some(cloud_path) = &self.cloud_path {
            write!(f, ", Cloud Path: {cloud_path}")?;
        }
        Ok(())
    }
}

/// 远程镜像目标
#[derive(Clone)]
pub struct LogMirror {
    pub sync: Arc<dyn RemoteSync>,
    pub destination: String,
}

/// 仅追加的本地备份日志
///
/// 每写入一条记录立即镜像到远程根目录，中途失败的运行也能留下审计痕迹
pub struct BackupLog {
    path: PathBuf,
    mirror: Option<LogMirror>,
    write_lock: Mutex<()>,
}

impl BackupLog {
    pub fn new(path: PathBuf, mirror: Option<LogMirror>) -> Self {
        Self {
            path,
            mirror,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 归档对应的远程路径：`<destination>/<timestamp>/<name>`
    pub fn cloud_path(&self, timestamp: &str, name: &str) -> Option<String> {
        self.mirror
            .as_ref()
            .map(|m| remote_join(&remote_join(&m.destination, timestamp), name))
    }

    /// 追加一条记录并镜像到远程
    pub async fn append(&self, record: &LogRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{record}\n").as_bytes()).await?;
        file.flush().await?;
        drop(file);

        debug!("写入备份日志: {}", record);

        if let Some(mirror) = &self.mirror {
            match mirror.sync.copy(&self.path, &mirror.destination).await {
                Ok(output) if classify_sync(&output) == UploadStatus::Success => {}
                Ok(output) => warn!("⚠️  备份日志镜像失败: {}", output.output.trim()),
                Err(e) => warn!("⚠️  备份日志镜像失败: {}", e),
            }
        }

        Ok(())
    }
}
