use crate::backup_log::{BackupLog, LogRecord};
use crate::constants::backup;
use crate::run::BackupRun;
use crate::{BackupError, Result};
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use futures::future::join_all;
use serde::Serialize;
use std::fs::File;
use std::collections::HashSet;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tar::Builder;
use tracing::{error, info, instrument, warn};
use walkdir::WalkDir;

/// 归档能力：把若干输入路径打包压缩为一个文件
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn create_archive(&self, output: &Path, inputs: &[PathBuf]) -> Result<()>;
}

/// tar + gzip 流式归档
#[derive(Debug, Clone)]
pub struct TarGzArchiver {
    compression_level: u32,
}

impl TarGzArchiver {
    pub fn new(compression_level: u32) -> Self {
        Self {
            compression_level: compression_level.min(9),
        }
    }
}

impl Default for TarGzArchiver {
    fn default() -> Self {
        Self::new(backup::DEFAULT_COMPRESSION_LEVEL)
    }
}

#[async_trait]
impl Archiver for TarGzArchiver {
    async fn create_archive(&self, output: &Path, inputs: &[PathBuf]) -> Result<()> {
        for input in inputs {
            if !input.exists() {
                return Err(BackupError::archive(format!(
                    "源路径不存在: {}",
                    input.display()
                )));
            }
        }

        // 在后台线程中执行压缩操作，避免阻塞异步运行时
        let inputs = inputs.to_vec();
        let output = output.to_path_buf();
        let compression = Compression::new(self.compression_level);

        tokio::task::spawn_blocking(move || write_tar_gz(&output, &inputs, compression)).await??;

        Ok(())
    }
}

fn write_tar_gz(output: &Path, inputs: &[PathBuf], compression: Compression) -> Result<()> {
    let file = File::create(output)?;
    let encoder = GzEncoder::new(BufWriter::new(file), compression);
    let mut archive = Builder::new(encoder);
    archive.follow_symlinks(false);

    for input in inputs {
        let base_name = input
            .file_name()
            .ok_or_else(|| BackupError::archive(format!("无法获取路径名: {}", input.display())))?
            .to_string_lossy()
            .to_string();

        if input.is_file() {
            archive
                .append_path_with_name(input, &base_name)
                .map_err(|e| BackupError::archive(format!("添加文件到归档失败: {e}")))?;
            continue;
        }

        for entry in WalkDir::new(input) {
            let entry = entry.map_err(|e| BackupError::archive(format!("遍历目录失败: {e}")))?;
            let path = entry.path();
            let relative_path = path.strip_prefix(input)?;

            // tar 内部统一使用 / 作为分隔符：{dir_name}/{relative_path}
            let archive_path = if relative_path.as_os_str().is_empty() {
                base_name.clone()
            } else {
                format!(
                    "{}/{}",
                    base_name,
                    relative_path.to_string_lossy().replace('\\', "/")
                )
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                archive
                    .append_dir(&archive_path, path)
                    .map_err(|e| BackupError::archive(format!("添加目录到归档失败: {e}")))?;
            } else if file_type.is_file() || file_type.is_symlink() {
                archive
                    .append_path_with_name(path, &archive_path)
                    .map_err(|e| BackupError::archive(format!("添加文件到归档失败: {e}")))?;
            }
            // socket、设备文件等特殊文件不归档
        }
    }

    let encoder = archive
        .into_inner()
        .map_err(|e| BackupError::archive(format!("完成归档失败: {e}")))?;
    let mut writer = encoder
        .finish()
        .map_err(|e| BackupError::archive(format!("完成压缩失败: {e}")))?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| BackupError::archive(format!("写入归档失败: {e}")))?
        .sync_all()?;

    Ok(())
}

/// 归档类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveKind {
    /// 主数据目录 + 容器配置快照
    Primary,
    /// 额外目录
    Additional,
}

/// 已完成并移动到运行目录的归档
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveArtifact {
    pub name: String,
    pub kind: ArchiveKind,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// 失败的归档
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveFailure {
    pub name: String,
    pub kind: ArchiveKind,
    pub source: PathBuf,
    pub error: String,
}

/// 归档阶段结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveReport {
    pub artifacts: Vec<ArchiveArtifact>,
    pub failures: Vec<ArchiveFailure>,
}

impl ArchiveReport {
    pub fn primary(&self) -> Option<&ArchiveArtifact> {
        self.artifacts.iter().find(|a| a.kind == ArchiveKind::Primary)
    }

    pub fn primary_failed(&self) -> bool {
        self.failures.iter().any(|f| f.kind == ArchiveKind::Primary)
    }

    pub fn total_bytes(&self) -> u64 {
        self.artifacts.iter().map(|a| a.size_bytes).sum()
    }
}

/// 单个归档任务
#[derive(Debug, Clone)]
struct ArchiveJob {
    name: String,
    staging_name: String,
    kind: ArchiveKind,
    source: PathBuf,
    inputs: Vec<PathBuf>,
}

/// 归档生产者
///
/// 所有归档先写到暂存目录，完整写入后再原子地重命名到运行目录，
/// 最终文件名下不会出现写了一半的归档
pub struct ArchiveProducer<'a> {
    archiver: &'a dyn Archiver,
    log: &'a BackupLog,
}

impl<'a> ArchiveProducer<'a> {
    pub fn new(archiver: &'a dyn Archiver, log: &'a BackupLog) -> Self {
        Self { archiver, log }
    }

    /// 生成主归档和每个额外目录的归档
    ///
    /// 各归档读写互不相交的路径，并发执行；单个失败不影响其它归档
    #[instrument(skip_all, fields(timestamp = %run.timestamp))]
    pub async fn produce(
        &self,
        run: &BackupRun,
        data_dir: &Path,
        config_snapshots: &[PathBuf],
        additional_dirs: &[PathBuf],
    ) -> ArchiveReport {
        let mut jobs = Vec::with_capacity(additional_dirs.len() + 1);
        let mut report = ArchiveReport::default();
        let mut taken = HashSet::new();

        let mut primary_inputs = vec![data_dir.to_path_buf()];
        primary_inputs.extend(config_snapshots.iter().cloned());
        taken.insert(backup::PRIMARY_ARCHIVE_NAME.to_string());
        jobs.push(ArchiveJob {
            name: backup::PRIMARY_ARCHIVE_NAME.to_string(),
            staging_name: format!("0-{}", backup::PRIMARY_ARCHIVE_NAME),
            kind: ArchiveKind::Primary,
            source: data_dir.to_path_buf(),
            inputs: primary_inputs,
        });

        for dir in additional_dirs {
            let name = match dir.file_name() {
                Some(base) => format!("{}{}", base.to_string_lossy(), backup::ARCHIVE_EXTENSION),
                None => format!("{}{}", dir.to_string_lossy().replace('/', "_"), backup::ARCHIVE_EXTENSION),
            };

            // 同名归档会写到同一个最终路径，冲突的额外目录直接记为失败
            if !taken.insert(name.clone()) {
                error!("❌ 归档 {} 失败，跳过: 归档名称 {} 已被占用", dir.display(), name);
                report.failures.push(ArchiveFailure {
                    name,
                    kind: ArchiveKind::Additional,
                    source: dir.clone(),
                    error: "归档名称与已有归档冲突".to_string(),
                });
                continue;
            }

            jobs.push(ArchiveJob {
                staging_name: format!("{}-{}", jobs.len(), name),
                name,
                kind: ArchiveKind::Additional,
                source: dir.clone(),
                inputs: vec![dir.clone()],
            });
        }

        info!("📦 开始生成 {} 个归档...", jobs.len());

        let results = join_all(jobs.into_iter().map(|job| self.run_job(run, job))).await;

        for result in results {
            match result {
                Ok(artifact) => report.artifacts.push(artifact),
                Err(failure) => report.failures.push(failure),
            }
        }

        if report.primary_failed() {
            error!("❌ 主数据归档失败，本次备份不包含主数据");
        }

        report
    }

    async fn run_job(
        &self,
        run: &BackupRun,
        job: ArchiveJob,
    ) -> std::result::Result<ArchiveArtifact, ArchiveFailure> {
        info!("💾 正在归档 {} -> {}", job.source.display(), job.name);

        match self.archive_one(run, &job).await {
            Ok(artifact) => {
                info!(
                    "✅ 归档完成: {} ({:.2} MB)",
                    artifact.name,
                    crate::constants::units::bytes_to_mb(artifact.size_bytes)
                );

                let record = LogRecord {
                    timestamp: run.timestamp.clone(),
                    size_bytes: artifact.size_bytes,
                    local_path: artifact.path.clone(),
                    cloud_path: self.log.cloud_path(&run.timestamp, &artifact.name),
                };
                if let Err(e) = self.log.append(&record).await {
                    warn!("⚠️  写入备份日志失败: {}", e);
                }

                Ok(artifact)
            }
            Err(e) => {
                match job.kind {
                    ArchiveKind::Primary => error!("❌ 归档 {} 失败: {}", job.name, e),
                    ArchiveKind::Additional => {
                        error!("❌ 归档 {} 失败，跳过: {}", job.source.display(), e)
                    }
                }
                Err(ArchiveFailure {
                    name: job.name,
                    kind: job.kind,
                    source: job.source,
                    error: e.to_string(),
                })
            }
        }
    }

    async fn archive_one(&self, run: &BackupRun, job: &ArchiveJob) -> Result<ArchiveArtifact> {
        let temp_path = run.staging_path(&job.staging_name);
        let final_path = run.final_path(&job.name);

        if let Err(e) = self.archiver.create_archive(&temp_path, &job.inputs).await {
            discard(&temp_path).await;
            return Err(e);
        }

        if let Err(e) = persist_atomically(&temp_path, &final_path).await {
            discard(&temp_path).await;
            return Err(e);
        }

        let size_bytes = tokio::fs::metadata(&final_path).await?.len();

        Ok(ArchiveArtifact {
            name: job.name.clone(),
            kind: job.kind,
            path: final_path,
            size_bytes,
        })
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("⚠️  清理临时归档失败 {}: {}", path.display(), e);
        }
    }
}

/// 把暂存文件原子地移动到最终路径
///
/// 暂存目录与运行目录不在同一文件系统时改用 `copy_then_rename`
pub async fn persist_atomically(temp_path: &Path, final_path: &Path) -> Result<()> {
    match tokio::fs::rename(temp_path, final_path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            copy_then_rename(temp_path, final_path).await
        }
        Err(e) => Err(e.into()),
    }
}

/// 跨文件系统移动：复制到目标目录下的 `.partial-` 文件，再在同一目录内重命名，最后删除暂存文件
///
/// 任一步失败都会删除 `.partial-` 文件，最终路径下不会出现不完整的归档
async fn copy_then_rename(temp_path: &Path, final_path: &Path) -> Result<()> {
    let parent = final_path
        .parent()
        .ok_or_else(|| BackupError::archive("无法获取目标目录"))?;
    let file_name = final_path
        .file_name()
        .ok_or_else(|| BackupError::archive("无法获取目标文件名"))?
        .to_string_lossy();
    let partial = parent.join(format!("{}{}", backup::PARTIAL_FILE_PREFIX, file_name));

    if let Err(e) = tokio::fs::copy(temp_path, &partial).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&partial, final_path).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    tokio::fs::remove_file(temp_path).await?;
    Ok(())
}
