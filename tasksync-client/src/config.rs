use crate::errors::ClientError;
use crate::ClientResult;
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://tasksync.db";
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Shortest interval the connectivity loop accepts; a zero period cannot tick.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(100);

const ENV_SERVER_URL: &str = "TASKSYNC_SERVER_URL";
const ENV_DATABASE_URL: &str = "TASKSYNC_DATABASE_URL";
const ENV_PROBE_INTERVAL: &str = "TASKSYNC_PROBE_INTERVAL_SECS";
const ENV_PROBE_TIMEOUT: &str = "TASKSYNC_PROBE_TIMEOUT_SECS";
const ENV_REQUEST_TIMEOUT: &str = "TASKSYNC_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub server_url: String,
    pub database_url: String,
    /// How often the connectivity loop probes while offline.
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            probe_interval: DEFAULT_PROBE_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `TASKSYNC_*` environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_SERVER_URL) {
            config.server_url = url;
        }
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            config.database_url = url;
        }
        if let Some(raw) = lookup(ENV_PROBE_INTERVAL) {
            config.probe_interval = parse_secs(ENV_PROBE_INTERVAL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_PROBE_TIMEOUT) {
            config.probe_timeout = parse_secs(ENV_PROBE_TIMEOUT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT) {
            config.request_timeout = parse_secs(ENV_REQUEST_TIMEOUT, &raw)?;
        }

        Ok(config)
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    /// Intervals below [`MIN_CHECK_INTERVAL`] are raised to it.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval.max(MIN_CHECK_INTERVAL);
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn parse_secs(key: &str, raw: &str) -> ClientResult<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ClientError::Config(format!("{} must be positive", key))),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ClientError::Config(format!("{}='{}': {}", key, raw, e))),
    }
}
