//! Configuration: a TOML file merged over defaults, then environment overrides.

use crate::core::queue::RetryPolicy;
use crate::core::scanner::DEFAULT_USER_AGENT;
use crate::error::ConfigError;
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const TIMEOUT_ENV: &str = "WEBPOSTURE_SCAN_TIMEOUT";
pub const WORKERS_ENV: &str = "WEBPOSTURE_WORKERS";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub scan: ScanSettings,
    pub queue: QueueSettings,
    pub store: StoreSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanSettings {
    /// Bound on every TLS handshake, HTTP request and DNS query.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueSettings {
    pub workers: usize,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            workers: 4,
            max_retries: policy.max_retries,
            retry_delay_secs: policy.delay.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    /// Where job records are kept. Defaults to `jobs/` under the data directory.
    pub dir: Option<PathBuf>,
    /// Log and acknowledge store write failures instead of failing the scan.
    pub lenient: bool,
}

impl Config {
    /// Loads `path`, or the default config file if it exists, or the defaults;
    /// then applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(|| {
            default_config_path().filter(|p| p.exists())
        });

        let mut config = match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration file.");
                Self::from_toml_str(&std::fs::read_to_string(&path)?)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Applies overrides read through `lookup` (the process environment in production).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(TIMEOUT_ENV) {
            self.scan.timeout_secs = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{} must be a number of seconds, got '{}'", TIMEOUT_ENV, value)))?;
        }
        if let Some(value) = lookup(WORKERS_ENV) {
            self.queue.workers = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{} must be a positive integer, got '{}'", WORKERS_ENV, value)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.timeout_secs == 0 {
            return Err(ConfigError::Invalid("scan.timeout_secs must be greater than 0".to_string()));
        }
        if self.queue.workers == 0 {
            return Err(ConfigError::Invalid("queue.workers must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.scan.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.queue.max_retries,
            delay: Duration::from_secs(self.queue.retry_delay_secs),
        }
    }

    pub fn store_dir(&self) -> PathBuf {
        self.store
            .dir
            .clone()
            .unwrap_or_else(|| data_dir().join("jobs"))
    }
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "webposture", env!("CARGO_PKG_NAME"))
}

/// Per-user data directory holding job records and the log file, or `./.data` when the
/// platform has no home directory.
pub fn data_dir() -> PathBuf {
    project_directory()
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".").join(".data"))
}

fn default_config_path() -> Option<PathBuf> {
    project_directory().map(|dirs| dirs.config_dir().join("config.toml"))
}
