// crates/core/src/config.rs
//! Client configuration: defaults, optional TOML file, then environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ClientError, ClientResult};
use crate::upload::MAX_UPLOAD_BYTES;

/// Default backend address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default catalog polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

const ENV_URL: &str = "TEXT2SQL_URL";
const ENV_POLL_SECS: &str = "TEXT2SQL_POLL_SECS";
const ENV_TIMEOUT_SECS: &str = "TEXT2SQL_TIMEOUT_SECS";

/// Runtime configuration for the client core.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend root, without the `/api` prefix.
    pub base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// Uploads get their own, longer timeout: ingestion runs inside the call.
    pub upload_timeout: Duration,
    /// Never above [`MAX_UPLOAD_BYTES`]; a config file may only lower it.
    pub max_upload_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: Duration::from_secs(60),
            upload_timeout: Duration::from_secs(120),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

/// On-disk shape of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    poll_interval_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    upload_timeout_secs: Option<u64>,
    max_upload_bytes: Option<u64>,
}

impl ClientConfig {
    /// Build the configuration.
    ///
    /// With `path`, that file must exist and parse. Without it, the default
    /// location is read when present. Environment variables are applied last.
    pub fn load(path: Option<&Path>) -> ClientResult<Self> {
        let mut config = Self::default();
        match path {
            Some(path) => config.apply_file(path)?,
            None => {
                if let Some(default) = default_config_path().filter(|p| p.exists()) {
                    config.apply_file(&default)?;
                }
            }
        }
        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> ClientResult<()> {
        let raw = std::fs::read_to_string(path).map_err(|e| ClientError::io(path, e))?;
        let file: ConfigFile = toml::from_str(&raw).map_err(|e| ClientError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if let Some(url) = file.base_url {
            self.base_url = url;
        }
        if let Some(secs) = file.poll_interval_secs {
            self.poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = file.upload_timeout_secs {
            self.upload_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(bytes) = file.max_upload_bytes {
            if bytes > MAX_UPLOAD_BYTES {
                tracing::warn!(bytes, limit = MAX_UPLOAD_BYTES, "Upload ceiling cannot be raised");
            }
            self.max_upload_bytes = bytes.min(MAX_UPLOAD_BYTES);
        }
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(())
    }

    /// Apply environment overrides. Unparseable values are logged and ignored.
    pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(url) = get(ENV_URL).filter(|u| !u.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(secs) = parse_secs(&get, ENV_POLL_SECS) {
            self.poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parse_secs(&get, ENV_TIMEOUT_SECS) {
            self.request_timeout = Duration::from_secs(secs.max(1));
        }
    }
}

fn parse_secs(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = get(key)?;
    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(secs),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring non-numeric environment override");
            None
        }
    }
}

/// `<config dir>/text2sql/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("text2sql").join("config.toml"))
}
