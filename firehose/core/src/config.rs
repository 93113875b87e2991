//! Stream Client Configuration
//!
//! Endpoint URLs, retry timing and queue sizing for a
//! [`StreamClient`](crate::StreamClient).
//!
//! Configuration can come from three places:
//! - [`StreamConfig::default`]: the public streaming endpoints
//! - [`StreamConfig::from_env`]: `FIREHOSE_*` environment variables
//! - [`StreamConfig::load_from_path`]: a TOML file; missing keys keep defaults

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default host of the streaming API
pub const DEFAULT_BASE_URL: &str = "https://stream.twitter.com";

/// Path of the filter endpoint (shared by follow and track)
pub const FILTER_PATH: &str = "/1.1/statuses/filter.json";

/// Path of the unfiltered sample endpoint
pub const SAMPLE_PATH: &str = "/1.1/statuses/sample.json";

/// Fixed delay between reconnect attempts
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5000;

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for [`StreamConfig`]
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration for a stream client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Endpoint for `follow` (filter by user id)
    pub follow_url: String,

    /// Endpoint for `track` (filter by keyword)
    pub track_url: String,

    /// Endpoint for `sample` (no filter)
    pub sample_url: String,

    /// Delay between reconnect attempts in milliseconds
    ///
    /// The read loop retries forever with this fixed delay; there is no
    /// escalation and no attempt cap.
    pub retry_delay_ms: u64,

    /// TCP/TLS connect timeout in milliseconds (0 = no timeout)
    pub connect_timeout_ms: u64,

    /// Treat the stream as dead after this long without any bytes (0 = never)
    ///
    /// The endpoints send blank keep-alive lines, so a silent socket usually
    /// means a half-open connection.
    pub stall_timeout_ms: u64,

    /// Capacity of the record queue
    ///
    /// When the queue is full the read loop waits for the consumer. A slow
    /// consumer therefore also delays detection of a dead stream.
    pub queue_capacity: usize,

    /// `User-Agent` sent with every handshake
    pub user_agent: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            follow_url: format!("{DEFAULT_BASE_URL}{FILTER_PATH}"),
            track_url: format!("{DEFAULT_BASE_URL}{FILTER_PATH}"),
            sample_url: format!("{DEFAULT_BASE_URL}{SAMPLE_PATH}"),
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            connect_timeout_ms: 10_000,
            stall_timeout_ms: 0,
            queue_capacity: 100,
            user_agent: concat!("firehose/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl StreamConfig {
    /// Point all three endpoints at another host, keeping the standard paths
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.follow_url = format!("{base}{FILTER_PATH}");
        self.track_url = format!("{base}{FILTER_PATH}");
        self.sample_url = format!("{base}{SAMPLE_PATH}");
        self
    }

    /// Set the reconnect delay
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the stall timeout (`Duration::ZERO` disables it)
    #[must_use]
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the record queue capacity
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `FIREHOSE_BASE_URL`: host for all endpoints (applied first)
    /// - `FIREHOSE_FOLLOW_URL`, `FIREHOSE_TRACK_URL`, `FIREHOSE_SAMPLE_URL`
    /// - `FIREHOSE_RETRY_DELAY_MS`: reconnect delay
    /// - `FIREHOSE_CONNECT_TIMEOUT_MS`: connect timeout
    /// - `FIREHOSE_STALL_TIMEOUT_MS`: stall timeout, 0 disables
    /// - `FIREHOSE_QUEUE_CAPACITY`: record queue capacity
    ///
    /// Unparseable numbers fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`StreamConfig::from_env`] with an arbitrary variable lookup
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = match var("FIREHOSE_BASE_URL") {
            Some(base) => Self::default().with_base_url(&base),
            None => Self::default(),
        };

        if let Some(url) = var("FIREHOSE_FOLLOW_URL") {
            config.follow_url = url;
        }
        if let Some(url) = var("FIREHOSE_TRACK_URL") {
            config.track_url = url;
        }
        if let Some(url) = var("FIREHOSE_SAMPLE_URL") {
            config.sample_url = url;
        }

        let number = |key: &str| var(key).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(ms) = number("FIREHOSE_RETRY_DELAY_MS") {
            config.retry_delay_ms = ms;
        }
        if let Some(ms) = number("FIREHOSE_CONNECT_TIMEOUT_MS") {
            config.connect_timeout_ms = ms;
        }
        if let Some(ms) = number("FIREHOSE_STALL_TIMEOUT_MS") {
            config.stall_timeout_ms = ms;
        }
        if let Some(capacity) = number("FIREHOSE_QUEUE_CAPACITY") {
            config.queue_capacity = usize::try_from(capacity).unwrap_or(usize::MAX).max(1);
        }

        config
    }

    /// Parse configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// errors of [`StreamConfig::from_toml_str`].
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = ?path.as_ref(), "Loaded stream config");
        Self::from_toml_str(&contents)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        for (name, url) in [
            ("follow_url", &self.follow_url),
            ("track_url", &self.track_url),
            ("sample_url", &self.sample_url),
        ] {
            if let Err(e) = url::Url::parse(url) {
                return Err(ConfigError::Invalid(format!("{name} `{url}`: {e}")));
            }
        }
        Ok(())
    }

    /// Reconnect delay
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Connect timeout, if any
    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }

    /// Stall timeout, if any
    #[must_use]
    pub fn stall_timeout(&self) -> Option<Duration> {
        (self.stall_timeout_ms > 0).then(|| Duration::from_millis(self.stall_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(
            config.follow_url,
            "https://stream.twitter.com/1.1/statuses/filter.json"
        );
        assert_eq!(config.follow_url, config.track_url);
        assert!(config.sample_url.ends_with("/sample.json"));
        assert_eq!(config.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.stall_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_base_url() {
        let config = StreamConfig::default().with_base_url("http://127.0.0.1:8080/");
        assert_eq!(
            config.track_url,
            "http://127.0.0.1:8080/1.1/statuses/filter.json"
        );
        assert_eq!(
            config.sample_url,
            "http://127.0.0.1:8080/1.1/statuses/sample.json"
        );
    }

    #[test]
    fn test_from_vars() {
        let vars: HashMap<&str, &str> = [
            ("FIREHOSE_BASE_URL", "http://localhost:9000"),
            ("FIREHOSE_SAMPLE_URL", "http://other:1/sample"),
            ("FIREHOSE_RETRY_DELAY_MS", "250"),
            ("FIREHOSE_STALL_TIMEOUT_MS", "90000"),
            ("FIREHOSE_QUEUE_CAPACITY", "0"),
            ("FIREHOSE_CONNECT_TIMEOUT_MS", "not a number"),
        ]
        .into_iter()
        .collect();

        let config = StreamConfig::from_vars(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(
            config.follow_url,
            "http://localhost:9000/1.1/statuses/filter.json"
        );
        assert_eq!(config.sample_url, "http://other:1/sample");
        assert_eq!(config.retry_delay(), Duration::from_millis(250));
        assert_eq!(config.stall_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.connect_timeout_ms, 10_000);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = StreamConfig::from_toml_str("retry_delay_ms = 100\nqueue_capacity = 8\n")
            .unwrap();
        assert_eq!(config.retry_delay_ms, 100);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.sample_url, StreamConfig::default().sample_url);
    }

    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(matches!(
            StreamConfig::from_toml_str("queue_capacity = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            StreamConfig::from_toml_str("track_url = \"not a url\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            StreamConfig::from_toml_str("retry_delay_ms = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sample_url = \"http://example.com/sample.json\"").unwrap();

        let config = StreamConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.sample_url, "http://example.com/sample.json");

        let missing = StreamConfig::load_from_path("/nonexistent/firehose.toml");
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
