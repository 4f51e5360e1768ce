use anyhow::Result;
use backup_core::config::AppConfig;
use std::path::Path;
use tracing::{info, warn};

/// 写入带注释的配置模板
///
/// 文件已存在且未指定 `force` 时不覆盖，返回 `false`
pub fn run_init(path: &Path, force: bool) -> Result<bool> {
    info!("🐳 Docker Backup 初始化");
    info!("======================");

    if path.exists() && !force {
        warn!("⚠️  配置文件已存在: {}", path.display());
        info!("如果要重新生成，请使用 --force 参数");
        info!("示例: docker-backup init --force");
        return Ok(false);
    }

    let config = AppConfig::default();
    config.save_to_file(path)?;
    info!("✅ 创建配置文件: {}", path.display());

    info!("👉 下一步:");
    info!("   1. 编辑 [paths] 中的数据目录和备份目录");
    info!("   2. 如需远程同步，配置 [remote] destination（rclone 目标）");
    info!("   3. 运行 'docker-backup check' 检查环境");
    info!("   4. 运行 'docker-backup run' 执行备份");

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_does_not_overwrite_without_force() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docker-backup.toml");

        assert!(run_init(&path, false).unwrap());
        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, AppConfig::default());

        std::fs::write(&path, "# edited").unwrap();
        assert!(!run_init(&path, false).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# edited");

        assert!(run_init(&path, true).unwrap());
        assert!(AppConfig::load_from_file(&path).is_ok());
    }
}
