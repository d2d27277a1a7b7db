//! 日志初始化.
//!
//! 控制台输出到 stderr (stdout 留给报告), 文件按天命名 `{prefix}.{YYYY-MM-DD}.log`.
//! 库 crate 通过 `log` 门面记录的日志经 tracing-subscriber 桥接到这里.

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Local, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

mod task;

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 文件日志级别过滤 (EnvFilter 语法)
    pub level: String,
    /// 控制台日志级别过滤
    pub console_level: String,
    /// 日志目录
    pub directory: String,
    /// 文件名前缀
    pub file_prefix: String,
    /// 历史日志保留天数
    pub retention_days: i64,
    /// 压缩历史日志
    pub compress_history: bool,
    /// 清理间隔 (秒)
    pub cleanup_interval_seconds: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_level: "warn".to_string(),
            directory: "logs".to_string(),
            file_prefix: "tao-inspector".to_string(),
            retention_days: 30,
            compress_history: true,
            cleanup_interval_seconds: 3600,
        }
    }
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 初始化全局日志, 并启动后台维护线程 (按天切换文件、压缩与清理历史日志)
///
/// 重复初始化返回错误.
pub fn init(config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)
        .with_context(|| format!("创建日志目录失败, path={}", config.directory))?;

    let rotate_requested = Arc::new(AtomicBool::new(false));
    let file_appender = CurrentFileWriter::new(
        Path::new(&config.directory),
        &config.file_prefix,
        Arc::clone(&rotate_requested),
    )?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_filter = EnvFilter::try_new(&config.console_level)
        .with_context(|| format!("无效的控制台日志级别: {}", config.console_level))?;
    let file_filter =
        EnvFilter::try_new(&config.level).with_context(|| format!("无效的日志级别: {}", config.level))?;

    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .event_format(ConsoleFormatter)
        .with_filter(console_filter);

    let file_layer = fmt::Layer::default()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("日志已初始化: {}", e))?;
    LOG_GUARD.set(guard).ok();

    task::spawn_log_maintenance(config.clone(), rotate_requested)?;

    Ok(())
}

struct CurrentFileWriter {
    directory: PathBuf,
    prefix: String,
    rotate_requested: Arc<AtomicBool>,
    file: File,
}

impl CurrentFileWriter {
    fn new(directory: &Path, prefix: &str, rotate_requested: Arc<AtomicBool>) -> Result<Self> {
        let today = Local::now().date_naive();
        let file = open_append_file(&build_current_log_path(directory, prefix, today))?;
        Ok(Self {
            directory: directory.to_path_buf(),
            prefix: prefix.to_string(),
            rotate_requested,
            file,
        })
    }

    fn reopen_current_file(&mut self) -> std::io::Result<()> {
        let today = Local::now().date_naive();
        let file_path = build_current_log_path(&self.directory, &self.prefix, today);
        self.file = open_append_file(&file_path).map_err(std::io::Error::other)?;
        Ok(())
    }
}

impl Write for CurrentFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.rotate_requested.swap(false, Ordering::AcqRel) {
            self.reopen_current_file()?;
        }
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

fn open_append_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("打开日志文件失败, path={}", path.display()))
}

pub(crate) fn build_current_log_path(directory: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    directory.join(format!("{}.{}.log", prefix, date.format("%Y-%m-%d")))
}

struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        let meta = event.metadata();
        write!(
            writer,
            "[{:02}:{:02}:{:02}.{:03}] ",
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis()
        )?;
        let color = match *meta.level() {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        };
        write!(writer, "{}{:5}\x1b[0m {} > ", color, meta.level().to_string(), meta.target())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        let meta = event.metadata();
        write!(
            writer,
            "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] {:5} {} > ",
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis(),
            meta.level().to_string(),
            meta.target()
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_current_log_path() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 18);
        match date {
            Some(date) => {
                let path = build_current_log_path(Path::new("logs"), "tao-inspector", date);
                assert_eq!(path, PathBuf::from("logs/tao-inspector.2026-10-18.log"));
            }
            None => panic!("测试日期初始化失败"),
        }
    }

    #[test]
    fn test_logging_config_defaults() {
        let config: LoggingConfig = serde_json::from_str(r#"{"directory": "/tmp/x"}"#).unwrap();
        assert_eq!(config.directory, "/tmp/x");
        assert_eq!(config.level, "info", "未指定的字段取默认值");
        assert_eq!(config.retention_days, 30);
        assert!(config.compress_history);
    }
}
