use crate::app::CliApp;
use anyhow::{Result, bail};
use backup_core::container::{DockerCli, take_inventory};
use backup_core::replication::RcloneSync;
use tracing::{error, info, warn};

/// 检查运行环境并显示当前运行中的容器
pub async fn run_check(app: &CliApp) -> Result<()> {
    let config = &app.config;
    let mut problems = 0;

    info!("🔍 环境检查");
    info!("===========");
    match &app.config_path {
        Some(path) => info!("配置文件: {}", path.display()),
        None => info!("配置文件: 自动查找"),
    }

    let docker = DockerCli::new();
    match docker.check_available().await {
        Ok(()) => info!("✅ Docker 可用"),
        Err(e) => {
            error!("❌ {}", e);
            problems += 1;
        }
    }

    match config.remote_destination() {
        Some(destination) => match RcloneSync::new().check_available() {
            Ok(()) => info!("✅ rclone 可用，远程目标: {}", destination),
            Err(e) => {
                error!("❌ {}", e);
                problems += 1;
            }
        },
        None => info!("➖ 未配置远程目标，跳过 rclone 检查"),
    }

    if config.notify_credentials().is_some() {
        info!("✅ 已配置推送通知");
    } else {
        info!("➖ 未配置推送通知");
    }

    for dir in std::iter::once(&config.paths.data_dir).chain(config.paths.additional_dirs.iter()) {
        if dir.exists() {
            info!("✅ 目录存在: {}", dir.display());
        } else {
            warn!("⚠️  目录不存在: {}", dir.display());
        }
    }

    match config.restart.self_exclusion() {
        Some(name) => info!("自身容器: {}", name),
        None => warn!("⚠️  未配置 restart.self_container，备份时会停止所有运行中的容器"),
    }

    match take_inventory(&docker).await {
        Ok(workloads) => {
            info!("🐳 运行中的容器 ({}):", workloads.len());
            for workload in &workloads {
                let marker = if config.restart.priority.contains(&workload.name) {
                    " [优先]"
                } else {
                    ""
                };
                info!("   - {} ({}){}", workload.name, workload.id.short(), marker);
            }
        }
        Err(e) => {
            error!("❌ 获取容器列表失败: {}", e);
            problems += 1;
        }
    }

    if problems > 0 {
        bail!("环境检查发现 {} 个问题", problems);
    }
    info!("🎉 环境检查通过");
    Ok(())
}
