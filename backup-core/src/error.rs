use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackupError>;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("配置解析错误: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("配置序列化错误: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("配置无效: {0}")]
    Config(String),

    #[error("HTTP 请求错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("任务执行错误: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("目录遍历错误: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("路径错误: {0}")]
    StripPrefix(#[from] std::path::StripPrefixError),

    #[error("容器运行时错误: {0}")]
    Runtime(String),

    #[error("归档操作失败: {0}")]
    Archive(String),

    #[error("远程同步失败: {0}")]
    Sync(String),

    #[error("通知发送失败: {0}")]
    Notify(String),

    #[error("备份保留清理失败: {0}")]
    Retention(String),

    #[error("超时错误: {operation} 操作超时 ({timeout_seconds}秒)")]
    Timeout {
        operation: String,
        timeout_seconds: u64,
    },

    #[error("已有备份任务在运行 (锁文件: {0})")]
    AlreadyRunning(String),

    #[error("配置文件未找到")]
    ConfigNotFound,

    #[error("自定义错误: {0}")]
    Custom(String),
}

impl BackupError {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    pub fn sync(msg: impl Into<String>) -> Self {
        Self::Sync(msg.into())
    }

    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    pub fn retention(msg: impl Into<String>) -> Self {
        Self::Retention(msg.into())
    }
}
