/// 备份目录及文件命名常量
pub mod backup {
    /// 运行目录时间戳格式，字典序即时间序
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

    /// 主归档文件名（数据目录 + 容器配置快照）
    pub const PRIMARY_ARCHIVE_NAME: &str = "docker_backup.tar.gz";

    /// 归档文件扩展名
    pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

    /// 容器配置快照文件后缀
    pub const CONFIG_SNAPSHOT_SUFFIX: &str = "_config.json";

    /// 备份日志文件名（位于备份根目录）
    pub const LOG_FILE_NAME: &str = "backup_log.txt";

    /// 暂存目录前缀
    pub const STAGING_DIR_PREFIX: &str = "docker-backup-";

    /// 跨文件系统移动时使用的临时文件前缀
    pub const PARTIAL_FILE_PREFIX: &str = ".partial-";

    /// 默认保留的备份数量
    pub const DEFAULT_MAX_BACKUPS: usize = 8;

    /// 默认 gzip 压缩级别
    pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
}

/// 超时与轮询相关常量（秒）
pub mod timeout {
    /// 有序重启阶段轮询容器状态的间隔
    pub const RESTART_POLL_INTERVAL: u64 = 5;

    /// 有序重启阶段等待单个容器就绪的超时时间
    pub const RESTART_CONFIRM_TIMEOUT: u64 = 300;
}

/// 外部命令相关常量
pub mod command {
    pub const DOCKER_BIN: &str = "docker";
    pub const RCLONE_BIN: &str = "rclone";

    /// rclone 输出中表示失败的标记（仅在没有退出码时作为回退判断）
    pub const RCLONE_FAILURE_MARKER: &str = "Failed to copy";
}

/// 推送通知相关常量
pub mod notify {
    pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

    /// 请求超时时间（秒）
    pub const REQUEST_TIMEOUT: u64 = 15;
}

/// 配置文件相关常量
pub mod config {
    /// 按优先级查找的配置文件名
    pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
        ["docker-backup.toml", "config.toml", ".docker-backup.toml"];

    /// 默认配置文件名
    pub const DEFAULT_CONFIG_FILE: &str = "docker-backup.toml";

    /// 单实例锁文件名（位于暂存目录）
    pub const LOCK_FILE_NAME: &str = "docker-backup.lock";
}

/// 单位换算
pub mod units {
    pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

    /// 字节数转换为 MB
    pub fn bytes_to_mb(bytes: u64) -> f64 {
        bytes as f64 / BYTES_PER_MB
    }
}
