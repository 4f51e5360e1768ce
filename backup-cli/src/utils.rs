use tracing_appender::non_blocking::WorkerGuard;

/// 日志文件路径环境变量，设置后日志写入文件而非终端
pub const LOG_FILE_ENV: &str = "DOCKER_BACKUP_LOG_FILE";

/// # 日志配置
///
/// 库代码只使用 `tracing` 宏，日志输出由这里统一配置。
///
/// - `-v, --verbose`：DEBUG 级别
/// - `RUST_LOG`：标准的日志级别过滤，优先于 `--verbose`
/// - `DOCKER_BACKUP_LOG_FILE`：日志追加写入该文件（后台线程写入）
///
/// ```bash
/// DOCKER_BACKUP_LOG_FILE=/var/log/docker-backup.log docker-backup run
/// RUST_LOG=backup_core::restart=debug docker-backup run
/// ```
///
/// 写入文件时返回的 guard 必须持有到进程结束，否则尾部日志会丢失
pub fn setup_logging(verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::{EnvFilter, fmt};

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if let Ok(log_file) = std::env::var(LOG_FILE_ENV) {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
        {
            Ok(file) => {
                let (writer, guard) = tracing_appender::non_blocking(file);
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .with_line_number(true)
                    .init();
                return Some(guard);
            }
            Err(e) => {
                eprintln!("无法打开日志文件 {log_file}: {e}，改为输出到终端");
            }
        }
    }

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_names(false)
        .with_line_number(false)
        .without_time()
        .compact()
        .init();
    None
}

/// 字节数格式化为便于阅读的大小
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}
