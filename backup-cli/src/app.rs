use anyhow::Result;
use backup_core::config::AppConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cli::Commands;
use crate::commands;

pub struct CliApp {
    pub config: AppConfig,
    pub config_path: Option<PathBuf>,
}

impl CliApp {
    /// 加载配置并初始化 CLI 应用
    ///
    /// 指定了路径时只加载该文件，否则按默认文件名顺序查找
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => AppConfig::load_from_file(path)?,
            None => AppConfig::find_and_load_config()?,
        };
        debug!("配置加载完成: {:?}", config);

        Ok(Self {
            config,
            config_path: config_path.map(Path::to_path_buf),
        })
    }

    /// 运行应用命令
    pub async fn run_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Run { json } => commands::run_backup(self, json).await,
            Commands::List => commands::run_list(self),
            Commands::Prune { max, dry_run } => commands::run_prune(self, max, dry_run).await,
            Commands::Check => commands::run_check(self).await,
            Commands::Init { .. } => anyhow::bail!("init 命令在加载配置之前处理"),
        }
    }
}
