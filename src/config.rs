//! Configuration types for search-batch
//!
//! Everything the dispatcher needs is carried by an explicit [`Config`] value
//! handed to it at construction. Nothing is read from process-wide state after
//! startup, so tests can build a `Config` with fake values.

use chrono::{Days, Local, NaiveDate, NaiveDateTime, NaiveTime};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable holding the service user name
pub const USERNAME_ENV: &str = "SPLUNK_USERNAME";
/// Environment variable holding the service password
pub const PASSWORD_ENV: &str = "SPLUNK_PASSWORD";

/// ISO-8601 layout used for the time bounds sent to the service
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Basic-auth credentials for the search service.
///
/// Never serialized; populated from the environment by the binary.
#[derive(Clone, Debug)]
pub struct Credentials {
    /// User name, also used as the owner segment of the REST namespace
    pub username: String,
    /// Password
    pub password: SecretString,
}

impl Credentials {
    /// Create credentials from a user name and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Read credentials from `SPLUNK_USERNAME` / `SPLUNK_PASSWORD`
    pub fn from_env() -> Result<Self> {
        let username = std::env::var(USERNAME_ENV)
            .map_err(|_| Error::config(format!("{USERNAME_ENV} is not set"), USERNAME_ENV))?;
        let password = std::env::var(PASSWORD_ENV)
            .map_err(|_| Error::config(format!("{PASSWORD_ENV} is not set"), PASSWORD_ENV))?;
        Ok(Self::new(username, password))
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("", "")
    }
}

/// Remote search service connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// URL scheme for the management API (default: "https")
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Management port appended to hosts without an explicit port (default: 8089)
    #[serde(default = "default_management_port")]
    pub port: u16,

    /// Per-request timeout (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Skip TLS certificate verification (default: false)
    ///
    /// Only for search heads with self-signed certificates on trusted networks.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            port: default_management_port(),
            request_timeout: default_request_timeout(),
            accept_invalid_certs: false,
        }
    }
}

/// Dispatcher behaviour: concurrency ceiling, polling cadence, deadlines
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum searches in flight at the service at once (default: 5)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_searches: usize,

    /// Pause between cycles (default: 5 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Status polls issued concurrently within one cycle (default: 1 = sequential)
    ///
    /// Results are always applied in active-set order by the dispatcher.
    #[serde(default = "default_poll_concurrency")]
    pub poll_concurrency: usize,

    /// Give up on a job after this many polls without a terminal state (None = never)
    #[serde(default)]
    pub max_polls: Option<u32>,

    /// Give up on a job this long after submission (None = never)
    #[serde(default, with = "optional_duration_serde")]
    pub job_timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: default_max_concurrent(),
            poll_interval: default_poll_interval(),
            poll_concurrency: default_poll_concurrency(),
            max_polls: None,
            job_timeout: None,
        }
    }
}

/// Default search time window, relative to today
///
/// The window ends `end_offset_days` before today at `end_hour:end_minute`
/// local time and starts `start_offset_days` before that.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindowConfig {
    /// Length of the window in days (default: 30)
    #[serde(default = "default_start_offset_days")]
    pub start_offset_days: u64,

    /// Days before today the window ends (default: 0)
    #[serde(default)]
    pub end_offset_days: u64,

    /// Hour of day the window ends (default: 0)
    #[serde(default)]
    pub end_hour: u32,

    /// Minute of the hour the window ends (default: 0)
    #[serde(default)]
    pub end_minute: u32,
}

impl Default for TimeWindowConfig {
    fn default() -> Self {
        Self {
            start_offset_days: default_start_offset_days(),
            end_offset_days: 0,
            end_hour: 0,
            end_minute: 0,
        }
    }
}

impl TimeWindowConfig {
    /// Resolve the window against today's local date
    pub fn resolve(&self) -> Result<(String, String)> {
        self.resolve_at(Local::now().naive_local())
    }

    /// Resolve the window against an explicit "now"
    pub fn resolve_at(&self, now: NaiveDateTime) -> Result<(String, String)> {
        let end_time = NaiveTime::from_hms_opt(self.end_hour, self.end_minute, 0)
            .ok_or_else(|| Error::config("end_hour/end_minute out of range", "end_hour"))?;
        let end_date = shift_back(now.date(), self.end_offset_days, "end_offset_days")?;
        let end = end_date.and_time(end_time);
        let start_date = shift_back(end_date, self.start_offset_days, "start_offset_days")?;
        let start = start_date.and_time(end_time);

        Ok((
            start.format(TIME_FORMAT).to_string(),
            end.format(TIME_FORMAT).to_string(),
        ))
    }
}

fn shift_back(date: NaiveDate, days: u64, key: &str) -> Result<NaiveDate> {
    date.checked_sub_days(Days::new(days))
        .ok_or_else(|| Error::config(format!("{key} moves the window out of range"), key))
}

/// Input and output file locations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Job list CSV (default: "queries.csv")
    #[serde(default = "default_query_file")]
    pub query_file: PathBuf,

    /// Progress snapshot CSV, overwritten after each finished job
    /// (default: "Reports/progress.csv")
    #[serde(default = "default_progress_file")]
    pub progress_file: PathBuf,

    /// Redraw the progress table in the terminal every cycle (default: true)
    #[serde(default = "default_true")]
    pub render_progress: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            query_file: default_query_file(),
            progress_file: default_progress_file(),
            render_progress: true,
        }
    }
}

/// Main configuration for a batch run
///
/// Fields are grouped into sub-configs:
/// - [`service`](ServiceConfig) - scheme, port, timeouts, TLS verification
/// - [`dispatch`](DispatchConfig) - ceiling, poll interval, deadlines
/// - [`window`](TimeWindowConfig) - default search time range
/// - [`output`](OutputConfig) - job list and progress file paths
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Search service connection settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Dispatcher settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Default time window
    #[serde(default)]
    pub window: TimeWindowConfig,

    /// File locations
    #[serde(default)]
    pub output: OutputConfig,

    /// Service credentials (taken from the environment, never serialized)
    #[serde(skip)]
    pub credentials: Credentials,
}

impl Config {
    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                format!("cannot read config file {}: {}", path.display(), e),
                "config",
            )
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Check settings the dispatcher relies on
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.max_concurrent_searches == 0 {
            return Err(Error::config(
                "max_concurrent_searches must be at least 1",
                "max_concurrent_searches",
            ));
        }
        if self.dispatch.poll_concurrency == 0 {
            return Err(Error::config(
                "poll_concurrency must be at least 1",
                "poll_concurrency",
            ));
        }
        if self.dispatch.max_polls == Some(0) {
            return Err(Error::config("max_polls must be at least 1", "max_polls"));
        }
        if !matches!(self.service.scheme.as_str(), "http" | "https") {
            return Err(Error::config(
                format!("unsupported scheme '{}'", self.service.scheme),
                "scheme",
            ));
        }
        if self.window.end_hour > 23 || self.window.end_minute > 59 {
            return Err(Error::config(
                "end_hour/end_minute out of range",
                "end_hour",
            ));
        }
        Ok(())
    }
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_management_port() -> u16 {
    8089
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_concurrent() -> usize {
    5
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_poll_concurrency() -> usize {
    1
}

fn default_start_offset_days() -> u64 {
    30
}

fn default_query_file() -> PathBuf {
    PathBuf::from("queries.csv")
}

fn default_progress_file() -> PathBuf {
    PathBuf::from("Reports/progress.csv")
}

fn default_true() -> bool {
    true
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

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
