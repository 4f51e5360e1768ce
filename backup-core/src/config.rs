use crate::constants::{backup, config, timeout};
use crate::error::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 应用配置结构
///
/// 启动时构造一次，之后以只读引用传递给各个组件
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    pub paths: PathsConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub restart: RestartConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub notify: Option<NotifyConfig>,
}

/// 路径相关配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PathsConfig {
    /// 暂存目录，用于配置快照和未完成的归档
    pub temp_dir: PathBuf,
    /// 备份根目录，每次运行在其下创建一个时间戳子目录
    pub backup_dir: PathBuf,
    /// 主数据目录（Docker volumes）
    pub data_dir: PathBuf,
    /// 额外需要备份的目录，每个目录单独生成一个归档
    #[serde(default)]
    pub additional_dirs: Vec<PathBuf>,
}

/// 备份保留配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetentionConfig {
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
}

/// 容器重启配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RestartConfig {
    /// 需要按顺序启动并确认运行的容器名称
    #[serde(default)]
    pub priority: Vec<String>,
    /// 运行本工具的容器名称，不会被停止
    #[serde(default)]
    pub self_container: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
}

/// 归档配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ArchiveConfig {
    /// gzip 压缩级别 (0-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

/// 远程同步配置（rclone 目标）
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RemoteConfig {
    pub destination: String,
}

/// Pushover 推送通知凭据
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NotifyConfig {
    pub api_token: String,
    pub user_key: String,
}

fn default_max_backups() -> usize {
    backup::DEFAULT_MAX_BACKUPS
}

fn default_poll_interval() -> u64 {
    timeout::RESTART_POLL_INTERVAL
}

fn default_confirm_timeout() -> u64 {
    timeout::RESTART_CONFIRM_TIMEOUT
}

fn default_compression_level() -> u32 {
    backup::DEFAULT_COMPRESSION_LEVEL
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_backups: default_max_backups(),
        }
    }
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            priority: Vec::new(),
            self_container: None,
            poll_interval_secs: default_poll_interval(),
            confirm_timeout_secs: default_confirm_timeout(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                temp_dir: std::env::temp_dir(),
                backup_dir: PathBuf::from("/backups"),
                data_dir: PathBuf::from("/var/lib/docker/volumes"),
                additional_dirs: Vec::new(),
            },
            retention: RetentionConfig::default(),
            restart: RestartConfig::default(),
            archive: ArchiveConfig::default(),
            remote: None,
            notify: None,
        }
    }
}

impl RestartConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    /// 自身容器名称（空字符串视为未配置）
    pub fn self_exclusion(&self) -> Option<&str> {
        self.self_container
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

impl AppConfig {
    /// 智能查找并加载配置文件
    /// 按优先级查找：docker-backup.toml -> config.toml -> .docker-backup.toml
    pub fn find_and_load_config() -> Result<Self> {
        for config_file in &config::CONFIG_FILE_CANDIDATES {
            if Path::new(config_file).exists() {
                tracing::info!("找到配置文件: {}", config_file);
                return Self::load_from_file(config_file);
            }
        }

        Err(BackupError::ConfigNotFound)
    }

    /// 从指定文件加载配置并校验
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BackupError::ConfigNotFound);
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_with_comments();
        fs::write(&path, content)?;
        Ok(())
    }

    /// 生成带注释的TOML配置
    fn to_toml_with_comments(&self) -> String {
        const TEMPLATE: &str = include_str!("../templates/config.toml.template");

        let remote_section = match self.remote_destination() {
            Some(destination) => format!("[remote]\ndestination = {}", toml_string(destination)),
            None => "# [remote]\n# destination = \"your_cloud_drive:Backups/\"".to_string(),
        };

        let notify_section = match self.notify_credentials() {
            Some(notify) => format!(
                "[notify]\napi_token = {}\nuser_key = {}",
                toml_string(&notify.api_token),
                toml_string(&notify.user_key)
            ),
            None => "# [notify]\n# api_token = \"YourTokenHere\"\n# user_key = \"YourUserKeyHere\""
                .to_string(),
        };

        let self_container = match self.restart.self_exclusion() {
            Some(name) => format!("self_container = {}", toml_string(name)),
            None => "# self_container = \"backup_container_name_here\"".to_string(),
        };

        TEMPLATE
            .replace("{temp_dir}", &toml_path(&self.paths.temp_dir))
            .replace("{backup_dir}", &toml_path(&self.paths.backup_dir))
            .replace("{data_dir}", &toml_path(&self.paths.data_dir))
            .replace(
                "{additional_dirs}",
                &toml_array(self.paths.additional_dirs.iter().map(|p| toml_path(p))),
            )
            .replace("{max_backups}", &self.retention.max_backups.to_string())
            .replace(
                "{priority}",
                &toml_array(self.restart.priority.iter().map(|n| toml_string(n))),
            )
            .replace("{self_container}", &self_container)
            .replace(
                "{poll_interval_secs}",
                &self.restart.poll_interval_secs.to_string(),
            )
            .replace(
                "{confirm_timeout_secs}",
                &self.restart.confirm_timeout_secs.to_string(),
            )
            .replace(
                "{compression_level}",
                &self.archive.compression_level.to_string(),
            )
            .replace("{remote_section}", &remote_section)
            .replace("{notify_section}", &notify_section)
    }

    /// 校验配置项
    pub fn validate(&self) -> Result<()> {
        if self.paths.backup_dir.as_os_str().is_empty() {
            return Err(BackupError::config("paths.backup_dir 不能为空"));
        }
        if self.paths.data_dir.as_os_str().is_empty() {
            return Err(BackupError::config("paths.data_dir 不能为空"));
        }
        if self.paths.temp_dir.as_os_str().is_empty() {
            return Err(BackupError::config("paths.temp_dir 不能为空"));
        }
        if self.retention.max_backups == 0 {
            return Err(BackupError::config("retention.max_backups 必须大于 0"));
        }
        if self.restart.poll_interval_secs == 0 {
            return Err(BackupError::config("restart.poll_interval_secs 必须大于 0"));
        }
        if self.archive.compression_level > 9 {
            return Err(BackupError::config(format!(
                "archive.compression_level 必须在 0-9 之间: {}",
                self.archive.compression_level
            )));
        }

        let mut seen = HashSet::new();
        for name in &self.restart.priority {
            if !seen.insert(name.as_str()) {
                return Err(BackupError::config(format!(
                    "restart.priority 中存在重复的容器名称: {name}"
                )));
            }
        }

        let mut archive_names = HashSet::new();
        archive_names.insert(backup::PRIMARY_ARCHIVE_NAME.to_string());
        for dir in &self.paths.additional_dirs {
            let name = dir
                .file_name()
                .ok_or_else(|| {
                    BackupError::config(format!("无法获取目录名: {}", dir.display()))
                })?
                .to_string_lossy()
                .to_string();
            let archive_name = format!("{name}{}", backup::ARCHIVE_EXTENSION);
            if archive_name == backup::PRIMARY_ARCHIVE_NAME {
                return Err(BackupError::config(format!(
                    "paths.additional_dirs 中的目录与主数据归档同名: {}",
                    dir.display()
                )));
            }
            if !archive_names.insert(archive_name) {
                return Err(BackupError::config(format!(
                    "paths.additional_dirs 中存在同名目录，归档会互相覆盖: {name}"
                )));
            }
        }

        Ok(())
    }

    /// 远程同步目标（空字符串视为未配置）
    pub fn remote_destination(&self) -> Option<&str> {
        self.remote
            .as_ref()
            .map(|r| r.destination.trim())
            .filter(|d| !d.is_empty())
    }

    /// 推送通知凭据（任一字段为空视为未配置）
    pub fn notify_credentials(&self) -> Option<&NotifyConfig> {
        self.notify
            .as_ref()
            .filter(|n| !n.api_token.trim().is_empty() && !n.user_key.trim().is_empty())
    }

    /// 备份日志文件路径
    pub fn log_file_path(&self) -> PathBuf {
        self.paths.backup_dir.join(backup::LOG_FILE_NAME)
    }

    /// 单实例锁文件路径
    pub fn lock_file_path(&self) -> PathBuf {
        self.paths.temp_dir.join(config::LOCK_FILE_NAME)
    }
}

fn toml_string(value: &str) -> String {
    // TOML 基本字符串与 JSON 字符串的转义规则兼容
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

fn toml_path(path: &Path) -> String {
    toml_string(&path.to_string_lossy())
}

fn toml_array(items: impl Iterator<Item = String>) -> String {
    let items: Vec<String> = items.collect();
    if items.is_empty() {
        "[]".to_string()
    } else {
        format!("[\n    {},\n]", items.join(",\n    "))
    }
}
