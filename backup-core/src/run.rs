use crate::config::AppConfig;
use crate::constants::backup;
use crate::{BackupError, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 一次备份运行
///
/// `final_dir` 持久保存直到被保留策略清理，`staging_dir` 在运行结束时删除
#[derive(Debug, Clone, Serialize)]
pub struct BackupRun {
    pub timestamp: String,
    pub started_at: DateTime<Local>,
    pub staging_dir: PathBuf,
    pub final_dir: PathBuf,
    #[serde(skip)]
    started: Instant,
}

impl BackupRun {
    /// 以给定开始时间创建运行目录和暂存目录
    ///
    /// `started` 与 `started_at` 应在同一时刻取得，耗时从该时刻起算。
    /// 同名运行目录已存在时返回错误，避免两次运行写入同一目录
    pub async fn create(
        config: &AppConfig,
        started_at: DateTime<Local>,
        started: Instant,
    ) -> Result<Self> {
        let timestamp = format_timestamp(&started_at);
        let final_dir = config.paths.backup_dir.join(&timestamp);
        let staging_dir = config
            .paths
            .temp_dir
            .join(format!("{}{}", backup::STAGING_DIR_PREFIX, timestamp));

        tokio::fs::create_dir_all(&config.paths.backup_dir).await?;

        if let Err(e) = tokio::fs::create_dir(&final_dir).await {
            return Err(if e.kind() == std::io::ErrorKind::AlreadyExists {
                BackupError::custom(format!("备份目录已存在: {}", final_dir.display()))
            } else {
                e.into()
            });
        }

        if let Err(e) = tokio::fs::create_dir_all(&staging_dir).await {
            // 暂存目录创建失败时回收刚建的空运行目录
            let _ = tokio::fs::remove_dir(&final_dir).await;
            return Err(e.into());
        }

        info!("📁 备份目录: {}", final_dir.display());
        debug!("暂存目录: {}", staging_dir.display());

        Ok(Self {
            timestamp,
            started_at,
            staging_dir,
            final_dir,
            started,
        })
    }

    /// 从开始到现在的耗时
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// 归档在暂存目录中的临时路径
    pub fn staging_path(&self, name: &str) -> PathBuf {
        self.staging_dir.join(name)
    }

    /// 归档在运行目录中的最终路径
    pub fn final_path(&self, name: &str) -> PathBuf {
        self.final_dir.join(name)
    }

    /// 删除暂存目录（尽力而为）
    pub async fn cleanup_staging(&self) {
        match tokio::fs::remove_dir_all(&self.staging_dir).await {
            Ok(_) => debug!("已清理暂存目录: {}", self.staging_dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "⚠️  清理暂存目录失败 {}: {}",
                self.staging_dir.display(),
                e
            ),
        }
    }
}

/// 生成运行目录名称
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    time.format(backup::TIMESTAMP_FORMAT).to_string()
}

/// 解析运行目录名称，不是合法时间戳时返回 None
pub fn parse_timestamp(name: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(name, backup::TIMESTAMP_FORMAT).ok()
}

/// 统计目录下所有文件的总字节数
pub fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn test_config(root: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.paths.temp_dir = root.join("tmp");
        config.paths.backup_dir = root.join("backups");
        config.paths.data_dir = root.join("data");
        config
    }

    #[test]
    fn test_timestamp_roundtrip_and_ordering() {
        let earlier = Local.with_ymd_and_hms(2024, 3, 9, 23, 59, 59).unwrap();
        let later = Local.with_ymd_and_hms(2024, 3, 10, 1, 0, 0).unwrap();

        let a = format_timestamp(&earlier);
        let b = format_timestamp(&later);
        assert_eq!(a, "2024-03-09-23-59-59");
        assert!(a < b);
        assert!(parse_timestamp(&a).is_some());
        assert!(parse_timestamp("backup_log.txt").is_none());
        assert!(parse_timestamp("2024-03-09").is_none());
    }

    #[tokio::test]
    async fn test_create_run_directories() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let started = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let run = BackupRun::create(&config, started, Instant::now()).await.unwrap();
        assert_eq!(run.timestamp, "2024-01-02-03-04-05");
        assert!(run.final_dir.is_dir());
        assert!(run.staging_dir.is_dir());
        assert_eq!(
            run.final_path("x.tar.gz"),
            dir.path().join("backups/2024-01-02-03-04-05/x.tar.gz")
        );

        run.cleanup_staging().await;
        assert!(!run.staging_dir.exists());
        assert!(run.final_dir.exists());
    }

    #[tokio::test]
    async fn test_existing_run_directory_is_rejected() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let started = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        BackupRun::create(&config, started, Instant::now()).await.unwrap();
        assert!(BackupRun::create(&config, started, Instant::now()).await.is_err());
    }

    #[tokio::test]
    async fn test_elapsed_counts_from_given_instant() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let started = Instant::now();

        // 模拟创建目录之前的加锁和盘点耗时
        tokio::time::sleep(Duration::from_millis(200)).await;

        let run = BackupRun::create(&config, Local::now(), started).await.unwrap();
        assert!(run.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_directory_size() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a"), vec![0u8; 100]).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b"), vec![0u8; 23]).unwrap();
        assert_eq!(directory_size(dir.path()), 123);
    }
}
