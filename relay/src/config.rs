use crate::dedup::{DEFAULT_WINDOW, MAX_WINDOW};
use crate::tracker::QUERY_PLACEHOLDER;
use crate::worker_pool::DEFAULT_WORKERS;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Invalid URL for {0}: {1}")]
    InvalidUrl(&'static str, String),

    #[error("Tracker URL must contain the {{}} query placeholder")]
    MissingQueryPlaceholder,

    #[error("Database name cannot be empty")]
    EmptyDatabase,

    #[error("{0} must be greater than 0")]
    Zero(&'static str),

    #[error("{0} cannot exceed {1}")]
    TooLarge(&'static str, usize),
}

/// Relay configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Base URL of the CouchDB server
    pub couch_uri: String,
    /// Database holding the telemetry documents
    pub couch_db: String,
    /// Tracker URL template; `{}` is replaced by the encoded query string
    pub tracker: String,
    /// Server-side filter applied to the change feed
    #[serde(default = "default_changes_filter")]
    pub changes_filter: String,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Number of payload documents whose receivers are remembered
    #[serde(default = "default_dedup_window")]
    pub dedup_window: usize,
    /// Transport timeout of a single tracker request
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
    /// Value of the `pass` parameter sent with every upload
    #[serde(default = "default_tracker_password")]
    pub tracker_password: String,
    /// Serves /health, /ready and /stats when set
    #[serde(default)]
    pub admin_listener: Option<Listener>,
}

fn default_changes_filter() -> String {
    "habitat/spacenear".into()
}

fn default_heartbeat_ms() -> u64 {
    1000
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_dedup_window() -> usize {
    DEFAULT_WINDOW
}

fn default_upload_timeout_secs() -> u64 {
    30
}

fn default_tracker_password() -> String {
    "aurora".into()
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        Url::parse(&self.couch_uri)
            .map_err(|e| ValidationError::InvalidUrl("couch_uri", e.to_string()))?;

        if self.couch_db.is_empty() {
            return Err(ValidationError::EmptyDatabase);
        }

        if !self.tracker.contains(QUERY_PLACEHOLDER) {
            return Err(ValidationError::MissingQueryPlaceholder);
        }
        Url::parse(&self.tracker.replacen(QUERY_PLACEHOLDER, "", 1))
            .map_err(|e| ValidationError::InvalidUrl("tracker", e.to_string()))?;

        for (name, value) in [
            ("heartbeat_ms", self.heartbeat_ms),
            ("workers", self.workers as u64),
            ("dedup_window", self.dedup_window as u64),
            ("upload_timeout_secs", self.upload_timeout_secs),
        ] {
            if value == 0 {
                return Err(ValidationError::Zero(name));
            }
        }

        if self.dedup_window > MAX_WINDOW {
            return Err(ValidationError::TooLarge("dedup_window", MAX_WINDOW));
        }

        if let Some(listener) = &self.admin_listener {
            listener.validate()?;
        }

        Ok(())
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        serde_yaml::from_str(
            r#"
couch_uri: http://localhost:5984
couch_db: habitat
tracker: "http://spacenear.us/tracker/track.php?{}"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = base_config();
        assert!(config.validate().is_ok());

        assert_eq!(config.changes_filter, "habitat/spacenear");
        assert_eq!(config.heartbeat(), Duration::from_secs(1));
        assert_eq!(config.workers, 5);
        assert_eq!(config.dedup_window, 30);
        assert_eq!(config.upload_timeout(), Duration::from_secs(30));
        assert_eq!(config.tracker_password, "aurora");
        assert_eq!(config.admin_listener, None);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
couch_uri: http://couch.internal:5984
couch_db: habitat
tracker: "http://tracker.internal/track.php?{}"
changes_filter: relay/telemetry
heartbeat_ms: 500
workers: 8
dedup_window: 100
upload_timeout_secs: 5
tracker_password: hunter2
admin_listener:
    host: 127.0.0.1
    port: 3001
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.changes_filter, "relay/telemetry");
        assert_eq!(config.heartbeat(), Duration::from_millis(500));
        assert_eq!(config.workers, 8);
        assert_eq!(config.dedup_window, 100);
        assert_eq!(config.tracker_password, "hunter2");
        assert_eq!(
            config.admin_listener,
            Some(Listener {
                host: "127.0.0.1".to_string(),
                port: 3001
            })
        );
    }

    #[test]
    fn test_validation_errors() {
        let mut config = base_config();
        config.couch_uri = "localhost".to_string();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidUrl("couch_uri", _))
        ));

        let mut config = base_config();
        config.couch_db = String::new();
        assert_eq!(config.validate(), Err(ValidationError::EmptyDatabase));

        let mut config = base_config();
        config.tracker = "http://spacenear.us/tracker/track.php".to_string();
        assert_eq!(config.validate(), Err(ValidationError::MissingQueryPlaceholder));

        let mut config = base_config();
        config.tracker = "spacenear.us/track.php?{}".to_string();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidUrl("tracker", _))
        ));

        let mut config = base_config();
        config.workers = 0;
        assert_eq!(config.validate(), Err(ValidationError::Zero("workers")));

        let mut config = base_config();
        config.dedup_window = 0;
        assert_eq!(config.validate(), Err(ValidationError::Zero("dedup_window")));

        let mut config = base_config();
        config.dedup_window = usize::MAX;
        assert_eq!(
            config.validate(),
            Err(ValidationError::TooLarge("dedup_window", MAX_WINDOW))
        );
        config.dedup_window = MAX_WINDOW;
        assert!(config.validate().is_ok());

        let mut config = base_config();
        config.admin_listener = Some(Listener {
            host: "0.0.0.0".to_string(),
            port: 0,
        });
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));
    }

    #[test]
    fn test_deserialization_errors() {
        // Missing required field
        assert!(serde_yaml::from_str::<Config>("couch_uri: http://localhost:5984").is_err());

        // Invalid number
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
couch_uri: http://localhost:5984
couch_db: habitat
tracker: "http://t/?{}"
workers: many
"#
            )
            .is_err()
        );
    }
}
