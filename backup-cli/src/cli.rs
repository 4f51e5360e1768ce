use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Docker Backup CLI - 停止容器、归档数据目录、重启容器并同步到远程
#[derive(Parser, Debug)]
#[command(name = "docker-backup")]
#[command(about = "Docker 容器及数据目录备份工具")]
#[command(version)]
pub struct Cli {
    /// 配置文件路径（未指定时依次查找 docker-backup.toml、config.toml、.docker-backup.toml）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 详细输出
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// 执行一次完整备份
    Run {
        /// 以 JSON 输出运行报告
        #[arg(long)]
        json: bool,
    },
    /// 列出本地所有备份
    List,
    /// 按保留数量清理旧备份
    Prune {
        /// 覆盖配置中的保留数量
        #[arg(long)]
        max: Option<usize>,
        /// 只显示将被删除的备份，不实际删除
        #[arg(long)]
        dry_run: bool,
    },
    /// 检查 docker / rclone 是否可用并显示当前运行中的容器
    Check,
    /// 创建配置文件模板
    Init {
        /// 如果配置文件已存在，强制覆盖
        #[arg(long)]
        force: bool,
    },
}
