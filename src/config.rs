//! Configuration types for gazette-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Largest accepted `jitter_max_factor`
pub const MAX_JITTER_FACTOR: f64 = 10.0;

/// Largest accepted `backoff_multiplier`
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

/// Document retrieval settings (storage root, HTTP client behaviour)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Root directory documents are stored under (default: "./data")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout (default: 180 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Shared request throttling settings
///
/// Every listing page and document request of a harvest passes through one
/// [`RequestThrottle`](crate::throttle::RequestThrottle) built from these values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Maximum number of requests in flight at once (default: 16)
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Minimum delay between the start of two consecutive requests (default: 0 ms)
    #[serde(default, with = "duration_millis_serde")]
    pub download_delay: Duration,

    /// Scale each delay by a random factor in `jitter_min_factor..=jitter_max_factor` (default: true)
    #[serde(default = "default_true")]
    pub randomize_download_delay: bool,

    /// Lower bound of the delay jitter factor (default: 0.5)
    #[serde(default = "default_jitter_min_factor")]
    pub jitter_min_factor: f64,

    /// Upper bound of the delay jitter factor (default: 1.5)
    #[serde(default = "default_jitter_max_factor")]
    pub jitter_max_factor: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            download_delay: Duration::ZERO,
            randomize_download_delay: true,
            jitter_min_factor: default_jitter_min_factor(),
            jitter_max_factor: default_jitter_max_factor(),
        }
    }
}

impl ThrottleConfig {
    /// Check the values for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_requests == 0 {
            return Err(Error::config(
                "max_concurrent_requests",
                "must allow at least one request in flight",
            ));
        }
        if !(self.jitter_min_factor >= 0.0) {
            return Err(Error::config(
                "jitter_min_factor",
                "must be a non-negative number",
            ));
        }
        if !(self.jitter_max_factor >= self.jitter_min_factor) {
            return Err(Error::config(
                "jitter_max_factor",
                "must not be lower than jitter_min_factor",
            ));
        }
        if self.jitter_max_factor > MAX_JITTER_FACTOR {
            return Err(Error::config(
                "jitter_max_factor",
                format!("must not exceed {}", MAX_JITTER_FACTOR),
            ));
        }
        Ok(())
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Record persistence settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database file; records are not persisted when unset
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Main configuration for [`GazetteHarvester`](crate::GazetteHarvester)
///
/// Sub-configs are flattened, so the JSON form is a single flat object:
///
/// ```json
/// { "download_dir": "./data", "max_concurrent_requests": 6, "download_delay": 1500 }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage root and HTTP client settings
    #[serde(flatten)]
    pub fetch: FetchConfig,

    /// Shared request throttling
    #[serde(flatten)]
    pub throttle: ThrottleConfig,

    /// Retry policy for listing pages and documents
    #[serde(default)]
    pub retry: RetryConfig,

    /// Record sink settings
    #[serde(flatten)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Parse a JSON configuration document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check the configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        self.throttle.validate()?;
        if !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&self.retry.backoff_multiplier) {
            return Err(Error::config(
                "backoff_multiplier",
                format!("must be between 1.0 and {}", MAX_BACKOFF_MULTIPLIER),
            ));
        }
        Ok(())
    }

    /// Storage root directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.fetch.download_dir
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_user_agent() -> String {
    format!("gazette-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(180)
}

fn default_max_concurrent_requests() -> usize {
    16
}

fn default_jitter_min_factor() -> f64 {
    0.5
}

fn default_jitter_max_factor() -> f64 {
    1.5
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    2
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

// Duration serialization helper (whole seconds)
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

// Request delays are sub-second, so they travel as milliseconds
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
