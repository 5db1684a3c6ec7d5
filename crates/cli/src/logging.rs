//! Tracing setup: human-readable stderr plus a daily-rotated file.

use complimenter_config::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log files are `bot.<date>.log` inside `logging.dir`.
const LOG_FILE_PREFIX: &str = "bot";
const LOG_FILE_SUFFIX: &str = "log";
/// Daily files kept before the oldest is deleted.
const LOG_RETENTION_DAYS: usize = 7;

/// Install the global subscriber. `RUST_LOG` wins over the configured level,
/// `--verbose` forces `debug`.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the whole process.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<WorkerGuard, InitError> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_writer, guard) = tracing_appender::non_blocking(file_appender(&config.dir)?);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .ok();

    Ok(guard)
}

/// Daily rotation keeping a week of files. Creates `dir` when missing.
fn file_appender(dir: &Path) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(LOG_RETENTION_DAYS)
        .build(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn appender_creates_dir_and_names_files() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        let mut appender = file_appender(&log_dir).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(&log_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("bot."), "{names:?}");
        assert!(names[0].ends_with(".log"), "{names:?}");
    }
}
