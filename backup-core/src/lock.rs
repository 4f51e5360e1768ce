use crate::{BackupError, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 单实例运行锁
///
/// 以 `create_new` 方式创建锁文件并写入进程号，drop 时删除。
/// 进程被强制终止时锁文件会残留，需要手动删除
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        Self::acquire_with(path, |file| writeln!(file, "{}", std::process::id()))
    }

    /// 创建锁文件后由 `write_holder` 写入持有者信息
    ///
    /// 写入失败时锁已构造完成，返回错误前随 drop 删除锁文件
    fn acquire_with<F>(path: &Path, write_holder: F) -> Result<Self>
    where
        F: FnOnce(&mut File) -> std::io::Result<()>,
    {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = std::fs::read_to_string(path).unwrap_or_default();
                warn!("锁文件已存在，持有者进程: {}", holder.trim());
                return Err(BackupError::AlreadyRunning(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let lock = Self {
            path: path.to_path_buf(),
        };
        write_holder(&mut file)?;
        debug!("已获取运行锁: {}", path.display());

        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("释放运行锁失败 {}: {}", self.path.display(), e);
        }
    }
}
