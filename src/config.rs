//! Configuration types for imperva-export
//!
//! A [`Config`] value is built once (defaults, then the YAML config file, then
//! environment and command-line overrides) and passed explicitly to the
//! [`ExportClient`](crate::ExportClient).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Production endpoint of the Account-Export API
pub const DEFAULT_BASE_URL: &str = "https://api.imperva.com/account-export-import";

/// File name looked up under `$HOME/.config` when no config file is given
pub const CONFIG_FILE_NAME: &str = "imperva-export-cli.yaml";

/// Credentials and endpoint of the remote API
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiConfig {
    /// Base URL without a trailing slash (default: production endpoint)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value of the `x-API-Id` header
    #[serde(default)]
    pub api_id: String,

    /// Value of the `x-API-Key` header
    #[serde(default)]
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_id: String::new(),
            api_key: String::new(),
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_id", &self.api_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Retry behavior of a single logical HTTP request
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 3, so at most 4 tries)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the 0-indexed `attempt` failed
    ///
    /// With the defaults this is `min(2^attempt, 30)` seconds.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
            .unwrap_or(self.max_delay)
    }
}

/// Completion polling behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PollConfig {
    /// Wait after the first "still running" answer (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_interval: Duration,

    /// Ceiling for the doubling poll interval (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_interval: Duration,

    /// Status requests allowed before giving up (default: 60)
    #[serde(default = "default_max_poll_attempts")]
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: default_initial_delay(),
            max_interval: default_max_delay(),
            max_attempts: default_max_poll_attempts(),
        }
    }
}

impl PollConfig {
    /// Interval following `current`: doubled, capped at `max_interval`
    pub fn next_interval(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_interval)
    }
}

/// Deadlines applied to each caller-facing operation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TimeoutConfig {
    /// Submitting an export (default: 60 seconds)
    #[serde(default = "default_short_timeout", with = "duration_serde")]
    pub submit: Duration,

    /// Waiting for completion and downloading, including submit in auto mode
    /// (default: 10 minutes)
    #[serde(default = "default_wait_timeout", with = "duration_serde")]
    pub wait: Duration,

    /// A single download attempt (default: 60 seconds)
    #[serde(default = "default_short_timeout", with = "duration_serde")]
    pub download: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            submit: default_short_timeout(),
            wait: default_wait_timeout(),
            download: default_short_timeout(),
        }
    }
}

/// Top-level configuration
///
/// Credential keys sit at the top level of the YAML file:
///
/// ```yaml
/// api-id: "12345"
/// api-key: "secret"
/// output-dir: ./exports
/// log-level: info
/// poll:
///   max-attempts: 30
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// API endpoint and credentials
    #[serde(flatten)]
    pub api: ApiConfig,

    /// Directory receiving export archives (default: ".")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// One of none, debug, info, warn, error (default: none)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Per-request retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Completion polling policy
    #[serde(default)]
    pub poll: PollConfig,

    /// Per-operation deadlines
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            output_dir: default_output_dir(),
            log_level: default_log_level(),
            retry: RetryConfig::default(),
            poll: PollConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Config {
    /// `$HOME/.config/imperva-export-cli.yaml`, if a home directory exists
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join(CONFIG_FILE_NAME))
    }

    /// Parse a YAML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::io("error reading config file", path, e))?;
        Self::from_yaml(&contents)
    }

    /// Parse YAML text; an empty document yields the defaults
    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).map_err(|e| Error::Config {
            message: format!("error reading config file: {e}"),
            key: None,
        })
    }

    /// Load `explicit` if given, otherwise the default file when it exists
    ///
    /// A missing explicit file is an error; a missing default file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "Loading config file");
                Self::from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Check that the config can be used to talk to the API
    pub fn validate(&self) -> Result<()> {
        if self.api.api_id.is_empty() {
            return Err(Error::Config {
                message: "API ID must be provided via flag, config file, or environment variable"
                    .to_string(),
                key: Some("api-id".to_string()),
            });
        }
        if self.api.api_key.is_empty() {
            return Err(Error::Config {
                message: "API Key must be provided via flag, config file, or environment variable"
                    .to_string(),
                key: Some("api-key".to_string()),
            });
        }
        if let Err(e) = url::Url::parse(&self.api.base_url) {
            return Err(Error::Config {
                message: format!("invalid base URL '{}': {e}", self.api.base_url),
                key: Some("base-url".to_string()),
            });
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "none".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_poll_attempts() -> u32 {
    60
}

fn default_short_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_wait_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

// Durations are written as whole seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
