//! Console and rolling file logging on top of `tracing-subscriber`.
//!
//! Verbosity is taken from `RUST_LOG`, e.g. `RUST_LOG=homeworks_hub_rs=debug`
//! to see every characteristic read and write.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Rotation period for log files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RotationPeriod {
    /// Rotate log files every minute.
    Minutely,
    /// Rotate log files every hour.
    Hourly,
    /// Rotate log files every day (default).
    #[default]
    Daily,
    /// Never rotate log files.
    Never,
}

impl std::str::FromStr for RotationPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minutely" | "minute" => Ok(RotationPeriod::Minutely),
            "hourly" | "hour" => Ok(RotationPeriod::Hourly),
            "daily" | "day" => Ok(RotationPeriod::Daily),
            "never" | "none" => Ok(RotationPeriod::Never),
            _ => Err(format!(
                "Invalid rotation period '{s}'. Valid options: minutely, hourly, daily, never"
            )),
        }
    }
}

impl From<RotationPeriod> for Rotation {
    fn from(period: RotationPeriod) -> Self {
        match period {
            RotationPeriod::Minutely => Rotation::MINUTELY,
            RotationPeriod::Hourly => Rotation::HOURLY,
            RotationPeriod::Daily => Rotation::DAILY,
            RotationPeriod::Never => Rotation::NEVER,
        }
    }
}

/// Configuration for file-based logging with rotation.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory where log files will be stored.
    pub log_dir: PathBuf,
    /// Prefix for log file names.
    pub log_prefix: String,
    /// How often to rotate log files.
    pub rotation: RotationPeriod,
    /// Maximum number of log files to keep (0 = unlimited).
    pub max_log_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("."),
            log_prefix: "homeworks-hub".to_string(),
            rotation: RotationPeriod::Daily,
            max_log_files: 7,
        }
    }
}

impl LogConfig {
    /// Splits a `--log-file` path into directory and file prefix.
    pub fn from_path(path: &str) -> Self {
        let path = PathBuf::from(path);
        let defaults = LogConfig::default();
        let log_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);
        let log_prefix = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or(defaults.log_prefix);
        Self {
            log_dir,
            log_prefix,
            ..defaults
        }
    }
}

/// Guard that must be kept alive to ensure logs are flushed.
///
/// When this guard is dropped, any remaining logs will be flushed to the output.
pub struct LogGuard {
    _guards: Vec<WorkerGuard>,
}

/// Sets up console-only logging (stdout/stderr).
///
/// Returns a guard that must be kept alive for the duration of the program.
pub fn setup_console_logging() -> LogGuard {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    LogGuard { _guards: vec![] }
}

/// Sets up file-based logging with automatic rotation, mirrored to stdout.
///
/// Log files are created in `config.log_dir` with the `config.log_prefix` prefix
/// and rotated based on the configured period. When the returned guard is
/// dropped, remaining logs are flushed.
pub fn setup_file_logging(config: LogConfig) -> std::io::Result<LogGuard> {
    let mut builder = RollingFileAppender::builder()
        .rotation(config.rotation.into())
        .filename_prefix(&config.log_prefix)
        .filename_suffix("log");
    if config.max_log_files > 0 {
        builder = builder.max_log_files(config.max_log_files);
    }
    let file_appender = builder
        .build(&config.log_dir)
        .map_err(std::io::Error::other)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = Layer::default()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);
    let console_layer = Layer::default()
        .with_writer(std::io::stdout)
        .with_target(true);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(LogGuard {
        _guards: vec![guard],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_period_from_str() {
        assert_eq!("daily".parse::<RotationPeriod>().unwrap(), RotationPeriod::Daily);
        assert_eq!("HOUR".parse::<RotationPeriod>().unwrap(), RotationPeriod::Hourly);
        assert_eq!("Minutely".parse::<RotationPeriod>().unwrap(), RotationPeriod::Minutely);
        assert_eq!("none".parse::<RotationPeriod>().unwrap(), RotationPeriod::Never);
        assert!("weekly".parse::<RotationPeriod>().is_err());
    }

    #[test]
    fn test_log_config_from_path() {
        let config = LogConfig::from_path("/var/log/homeworks/bridge.log");
        assert_eq!(config.log_dir, PathBuf::from("/var/log/homeworks"));
        assert_eq!(config.log_prefix, "bridge");
        assert_eq!(config.rotation, RotationPeriod::Daily);
        assert_eq!(config.max_log_files, 7);

        let config = LogConfig::from_path("bridge.log");
        assert_eq!(config.log_dir, PathBuf::from("."));
        assert_eq!(config.log_prefix, "bridge");
    }
}
