use super::{LoggingConfig, build_current_log_path};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, TimeZone};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::error;

/// 启动日志维护线程: 跨日时通知写入端切换文件, 并定期压缩与清理历史日志
pub(super) fn spawn_log_maintenance(config: LoggingConfig, rotate_requested: Arc<AtomicBool>) -> Result<()> {
    thread::Builder::new()
        .name("tao-log-maintenance".into())
        .spawn(move || run_maintenance(config, rotate_requested))
        .context("启动日志维护线程失败")?;
    Ok(())
}

fn run_maintenance(config: LoggingConfig, rotate_requested: Arc<AtomicBool>) {
    if let Err(err) = ensure_current_log_file(&config) {
        error!("初始化当前日志文件失败: {}", err);
    }
    if let Err(err) = cleanup_logs(&config) {
        error!("启动时清理日志失败: {}", err);
    }

    let cleanup_interval = Duration::from_secs(config.cleanup_interval_seconds.max(1));
    let mut current_date = Local::now().date_naive();
    loop {
        let wait = until_next_rollover(Local::now()).min(cleanup_interval);
        thread::sleep(wait);

        let today = Local::now().date_naive();
        if today != current_date {
            current_date = today;
            match ensure_current_log_file(&config) {
                Ok(()) => rotate_requested.store(true, Ordering::Release),
                Err(err) => error!("日志翻滚失败: {}", err),
            }
        }
        if let Err(err) = cleanup_logs(&config) {
            error!("清理日志失败: {}", err);
        }
    }
}

fn ensure_current_log_file(config: &LoggingConfig) -> Result<()> {
    let directory = Path::new(&config.directory);
    fs::create_dir_all(directory)?;
    let today = Local::now().date_naive();
    let current_path = build_current_log_path(directory, &config.file_prefix, today);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&current_path)
        .with_context(|| format!("创建当前日志文件失败, path={}", current_path.display()))?;
    Ok(())
}

fn cleanup_logs(config: &LoggingConfig) -> Result<()> {
    let directory = Path::new(&config.directory);
    if !directory.exists() {
        return Ok(());
    }

    let today = Local::now().date_naive();
    let cutoff = today - ChronoDuration::days(config.retention_days);

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some((date, compressed)) = parse_rotated_log_name(&file_name, &config.file_prefix) else {
            continue;
        };
        let file_path = entry.path();

        if date < cutoff {
            let _ = fs::remove_file(&file_path);
            continue;
        }
        if config.compress_history && !compressed && date < today {
            if let Err(err) = compress_to_gz(&file_path) {
                error!("压缩历史日志失败: {}", err);
            }
        }
    }

    Ok(())
}

fn compress_to_gz(path: &Path) -> Result<()> {
    let gz_path = PathBuf::from(format!("{}.gz", path.display()));
    if gz_path.exists() {
        return Ok(());
    }

    let mut input = File::open(path).with_context(|| format!("打开待压缩日志失败, path={}", path.display()))?;
    let output =
        File::create(&gz_path).with_context(|| format!("创建压缩日志失败, path={}", gz_path.display()))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;

    fs::remove_file(path).with_context(|| format!("删除已压缩日志失败, path={}", path.display()))?;
    Ok(())
}

fn parse_rotated_log_name(file_name: &str, prefix: &str) -> Option<(NaiveDate, bool)> {
    let with_dot = file_name.strip_prefix(prefix)?.strip_prefix('.')?;

    if let Some(date_part) = with_dot.strip_suffix(".log") {
        return Some((parse_date(date_part)?, false));
    }
    if let Some(date_part) = with_dot.strip_suffix(".log.gz") {
        return Some((parse_date(date_part)?, true));
    }
    None
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// 距下一个本地零点的时长; 无法确定时返回 1 秒
fn until_next_rollover(now: DateTime<Local>) -> Duration {
    let next_midnight = (now.date_naive() + ChronoDuration::days(1))
        .and_hms_opt(0, 0, 0)
        .and_then(|t| Local.from_local_datetime(&t).earliest());
    match next_midnight {
        Some(at) => (at - now).to_std().unwrap_or(Duration::from_secs(1)),
        None => Duration::from_secs(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn temp_config(temp_dir: &TempDir) -> LoggingConfig {
        LoggingConfig {
            directory: temp_dir.path().to_string_lossy().to_string(),
            file_prefix: "inspect".to_string(),
            retention_days: 7,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_rotated_log_name() {
        let parsed = parse_rotated_log_name("inspect.2026-10-18.log", "inspect");
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2026, 10, 18).map(|d| (d, false)));

        let parsed = parse_rotated_log_name("inspect.2026-10-18.log.gz", "inspect");
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2026, 10, 18).map(|d| (d, true)));

        assert!(parse_rotated_log_name("inspect.log", "inspect").is_none());
        assert!(parse_rotated_log_name("other.2026-10-18.log", "inspect").is_none());
    }

    #[test]
    fn test_cleanup_compresses_and_expires() {
        let temp_dir = match TempDir::new() {
            Ok(temp_dir) => temp_dir,
            Err(err) => panic!("创建临时目录失败: {}", err),
        };
        let config = temp_config(&temp_dir);
        let dir = temp_dir.path();
        let today = Local::now().date_naive();

        let yesterday = build_current_log_path(dir, "inspect", today - ChronoDuration::days(1));
        fs::write(&yesterday, b"old line\n").unwrap();
        let expired = build_current_log_path(dir, "inspect", today - ChronoDuration::days(30));
        fs::write(&expired, b"expired\n").unwrap();
        let current = build_current_log_path(dir, "inspect", today);
        fs::write(&current, b"current\n").unwrap();

        let result = cleanup_logs(&config);
        assert!(result.is_ok(), "清理日志失败: {:?}", result.err());

        assert!(!expired.exists(), "超过保留期的日志被删除");
        assert!(current.exists(), "当天日志不压缩");
        assert!(!yesterday.exists());
        let gz_path = PathBuf::from(format!("{}.gz", yesterday.display()));
        let mut text = String::new();
        flate2::read::GzDecoder::new(File::open(&gz_path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "old line\n");
    }

    #[test]
    fn test_ensure_current_log_file() {
        let temp_dir = match TempDir::new() {
            Ok(temp_dir) => temp_dir,
            Err(err) => panic!("创建临时目录失败: {}", err),
        };
        let config = temp_config(&temp_dir);
        let ensured = ensure_current_log_file(&config);
        assert!(ensured.is_ok(), "创建当前日志文件失败: {:?}", ensured.err());

        let today = Local::now().date_naive();
        let current_path = build_current_log_path(Path::new(&config.directory), &config.file_prefix, today);
        assert!(current_path.exists(), "当前日志文件不存在");
    }

    #[test]
    fn test_until_next_rollover() {
        let wait = until_next_rollover(Local::now());
        assert!(wait <= Duration::from_secs(25 * 3600));
    }
}
