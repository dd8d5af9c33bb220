//! Configuration types for rnc-importer

use crate::error::{Error, Result};
use crate::scheduler::{ImportSchedule, Weekday};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Main configuration for the importer
///
/// Every section has defaults, so `Config::default()` is a working setup that
/// imports the public registry into `./rnc-importer.db` every Monday at 03:00 UTC.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the registry archive lives
    #[serde(default)]
    pub source: SourceConfig,

    /// Batching and reporting knobs for a run
    #[serde(default)]
    pub import: ImportConfig,

    /// Retry behavior for the fetch stage
    #[serde(default)]
    pub retry: RetryConfig,

    /// Default SQLite store
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Weekly trigger
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// HTTP trigger endpoint
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.import.batch_size == 0 {
            return Err(config_error(
                "batch_size must be at least 1",
                "import.batch_size",
            ));
        }

        if self.import.queue_capacity == 0 {
            return Err(config_error(
                "queue_capacity must be at least 1",
                "import.queue_capacity",
            ));
        }

        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(config_error(
                format!("backoff_multiplier must be a finite number >= 1.0, got {multiplier}"),
                "retry.backoff_multiplier",
            ));
        }

        if self.source.url.trim().is_empty() {
            return Err(config_error("source URL is empty", "source.url"));
        }

        if let Err(e) = url::Url::parse(&self.source.url) {
            return Err(config_error(
                format!("invalid source URL {:?}: {e}", self.source.url),
                "source.url",
            ));
        }

        if self.source.entry_path.trim().is_empty() {
            return Err(config_error(
                "archive entry path is empty",
                "source.entry_path",
            ));
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

/// Remote archive location
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Archive URL (default: the DGII public RNC archive)
    #[serde(default = "default_source_url")]
    pub url: String,

    /// Exact entry path inside the archive (default: "TMP/DGII_RNC.TXT")
    #[serde(default = "default_entry_path")]
    pub entry_path: String,

    /// Whole-request timeout for the download (default: 300 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub fetch_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            entry_path: default_entry_path(),
            fetch_timeout: default_fetch_timeout(),
        }
    }
}

/// Per-run batching configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Records per storage transaction (default: 1000)
    ///
    /// Bounds transaction size and the memory held by one in-flight batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Parsed batches allowed to wait for the persister (default: 2)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Rejected lines kept verbatim in the summary (default: 100)
    #[serde(default = "default_max_failure_samples")]
    pub max_failure_samples: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            queue_capacity: default_queue_capacity(),
            max_failure_samples: default_max_failure_samples(),
        }
    }
}

/// Retry configuration for the fetch stage
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 5 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
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

/// Storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./rnc-importer.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Weekly import trigger
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Run the weekly scheduler (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Day of week (default: Monday)
    #[serde(default = "default_schedule_day")]
    pub day: Weekday,

    /// UTC time of day, HH:MM:SS (default: 03:00:00)
    #[serde(
        default = "default_schedule_time",
        with = "crate::scheduler::time_format"
    )]
    pub time: NaiveTime,
}

impl ScheduleConfig {
    /// The configured weekly trigger point
    pub fn schedule(&self) -> ImportSchedule {
        ImportSchedule::weekly(self.day, self.time)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            day: default_schedule_day(),
            time: default_schedule_time(),
        }
    }
}

/// HTTP trigger configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8089)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

// Default value functions
fn default_source_url() -> String {
    "https://dgii.gov.do/app/WebApps/Consultas/RNC/DGII_RNC.zip".to_string()
}

fn default_entry_path() -> String {
    "TMP/DGII_RNC.TXT".to_string()
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_batch_size() -> usize {
    1000
}

fn default_queue_capacity() -> usize {
    2
}

fn default_max_failure_samples() -> usize {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./rnc-importer.db")
}

fn default_schedule_day() -> Weekday {
    Weekday::Monday
}

fn default_schedule_time() -> NaiveTime {
    NaiveTime::from_hms_opt(3, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8089))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
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
