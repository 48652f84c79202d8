// crates/observability/src/lib.rs
//! Tracing setup shared by the text2sql binaries.
//!
//! One call to [`init_tracing`] installs a registry with an `EnvFilter`, a
//! stderr layer (compact or JSON) and, optionally, a daily-rolling file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn,text2sql_core=info,text2sql_cli=info";

const ENV_JSON: &str = "TEXT2SQL_LOG_JSON";
const ENV_FILE: &str = "TEXT2SQL_LOG_FILE";
const LOG_FILE_PREFIX: &str = "text2sql.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// JSON lines on stderr instead of the compact human format.
    pub json: bool,
    /// Also write to a daily-rolling file in this directory.
    pub file_dir: Option<PathBuf>,
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            json: false,
            file_dir: None,
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl LogConfig {
    /// Defaults, overridden by `TEXT2SQL_LOG_JSON` and `TEXT2SQL_LOG_FILE`.
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn from_env_with(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if get(ENV_JSON).as_deref().is_some_and(is_truthy) {
            config.json = true;
        }
        if get(ENV_FILE).as_deref().is_some_and(is_truthy) {
            config.file_dir = default_log_dir();
        }
        config
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// `<data local dir>/text2sql/logs`.
pub fn default_log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("text2sql").join("logs"))
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when file logging is on; keep it alive
/// for the life of the process or buffered lines are lost.
pub fn init_tracing(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let stderr_layer = if config.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file_layer, guard) = match &config.file_dir {
        Some(dir) => {
            let (writer, guard) = file_writer(dir)?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(guard)
}

fn file_writer(
    dir: &Path,
) -> anyhow::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        let config = LogConfig::default();
        assert!(!config.json);
        assert!(config.file_dir.is_none());
        assert_eq!(config.default_filter, "warn,text2sql_core=info,text2sql_cli=info");
    }

    #[test]
    fn test_env_flags() {
        let config = LogConfig::from_env_with(|key| match key {
            "TEXT2SQL_LOG_JSON" => Some("TRUE".into()),
            "TEXT2SQL_LOG_FILE" => Some("0".into()),
            _ => None,
        });
        assert!(config.json);
        assert!(config.file_dir.is_none());
    }

    #[test]
    fn test_file_flag_uses_data_dir() {
        let config = LogConfig::from_env_with(|key| (key == "TEXT2SQL_LOG_FILE").then(|| "yes".into()));
        assert_eq!(config.file_dir, default_log_dir());
    }

    #[test]
    #[serial_test::serial]
    fn test_init_with_file_layer() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            file_dir: Some(dir.path().join("logs")),
            ..LogConfig::default()
        };
        let guard = init_tracing(&config).unwrap();
        assert!(guard.is_some());
        assert!(dir.path().join("logs").is_dir());
        tracing::info!("written to file");

        // Only one global subscriber per process.
        assert!(init_tracing(&LogConfig::default()).is_err());
    }
}
