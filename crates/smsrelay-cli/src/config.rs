//! SMS relay CLI configuration
//!
//! Loaded from a TOML file when `--config` is given, otherwise defaults.
//! `SMSRELAY_ENDPOINT` overrides the relay endpoint from either source.
//! Durations are whole seconds so the file stays hand-editable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use smsrelay_core::{HeartbeatConfig, RelaySettings, WorkerPoolConfig};

use crate::error::{CliError, Result};

/// Environment variable overriding `[relay] endpoint`
pub const ENDPOINT_ENV: &str = "SMSRELAY_ENDPOINT";

/// Name of the persisted key-value state inside the data directory
pub const STATE_FILE: &str = "state.json";

/// Name of the outbox file inside the data directory
pub const OUTBOX_FILE: &str = "outbox.jsonl";

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub relay: RelaySection,
    pub heartbeat: HeartbeatSection,
    pub workers: WorkersSection,
    pub host: HostSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    /// Base address of the relay backend
    pub endpoint: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatSection {
    pub interval_secs: u64,
    pub initial_retry_secs: u64,
    pub max_retry_secs: u64,
    pub backoff_multiplier: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersSection {
    pub count: usize,
    pub queue_capacity: usize,
}

/// Reference host settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSection {
    /// `host:port` probed for connectivity; defaults to the endpoint's own
    pub connectivity_target: Option<String>,
    pub connectivity_timeout_secs: u64,
    /// Fixed hardware identifier; detected from the machine when unset
    pub hardware_id: Option<String>,
    /// Outbox file; defaults to `outbox.jsonl` in the data directory
    pub outbox_file: Option<PathBuf>,
}

// ----------------------------------------------------------------------------
// Default Implementations
// ----------------------------------------------------------------------------

impl Default for RelaySection {
    fn default() -> Self {
        let settings = RelaySettings::default();
        Self {
            endpoint: settings.endpoint,
            request_timeout_secs: settings.request_timeout.as_secs(),
        }
    }
}

impl Default for HeartbeatSection {
    fn default() -> Self {
        let heartbeat = HeartbeatConfig::default();
        Self {
            interval_secs: heartbeat.interval.as_secs(),
            initial_retry_secs: heartbeat.initial_retry_delay.as_secs(),
            max_retry_secs: heartbeat.max_retry_delay.as_secs(),
            backoff_multiplier: heartbeat.backoff_multiplier,
        }
    }
}

impl Default for WorkersSection {
    fn default() -> Self {
        let workers = WorkerPoolConfig::default();
        Self {
            count: workers.workers,
            queue_capacity: workers.queue_capacity,
        }
    }
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            connectivity_target: None,
            connectivity_timeout_secs: 5,
            hardware_id: None,
            outbox_file: None,
        }
    }
}

// ----------------------------------------------------------------------------
// Loading
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load from `path` when given, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(std::env::var(ENDPOINT_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::Config(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply an endpoint override; blank values are ignored
    pub fn apply_env_overrides(&mut self, endpoint: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            self.relay.endpoint = endpoint.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.relay_settings()
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        if self.host.connectivity_timeout_secs == 0 {
            return Err(CliError::Config(
                "Connectivity timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Runtime settings described by this configuration
    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            endpoint: self.relay.endpoint.clone(),
            request_timeout: Duration::from_secs(self.relay.request_timeout_secs),
            workers: WorkerPoolConfig {
                workers: self.workers.count,
                queue_capacity: self.workers.queue_capacity,
            },
            heartbeat: HeartbeatConfig {
                interval: Duration::from_secs(self.heartbeat.interval_secs),
                initial_retry_delay: Duration::from_secs(self.heartbeat.initial_retry_secs),
                max_retry_delay: Duration::from_secs(self.heartbeat.max_retry_secs),
                backoff_multiplier: self.heartbeat.backoff_multiplier,
            },
        }
    }

    /// `host:port` the connectivity probe dials
    pub fn connectivity_target(&self) -> Result<String> {
        if let Some(target) = &self.host.connectivity_target {
            return Ok(target.clone());
        }

        let url = self
            .relay_settings()
            .endpoint_url()
            .map_err(|e| CliError::Config(e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| CliError::Config(format!("Endpoint has no host: {}", url)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| CliError::Config(format!("Endpoint has no port: {}", url)))?;
        Ok(format!("{}:{}", host, port))
    }

    pub fn connectivity_timeout(&self) -> Duration {
        Duration::from_secs(self.host.connectivity_timeout_secs)
    }

    pub fn outbox_path(&self, data_dir: &Path) -> PathBuf {
        self.host
            .outbox_file
            .clone()
            .unwrap_or_else(|| data_dir.join(OUTBOX_FILE))
    }

    /// Default data directory, `~/.smsrelay`
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".smsrelay"))
            .ok_or_else(|| CliError::Config("Could not determine home directory".to_string()))
    }

    /// Example configuration file content
    pub fn example_config() -> Result<String> {
        let example = AppConfig {
            host: HostSection {
                connectivity_target: Some("relay.example.com:443".to_string()),
                hardware_id: Some("0123456789abcdef".to_string()),
                ..HostSection::default()
            },
            ..AppConfig::default()
        };
        Ok(toml::to_string_pretty(&example)?)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_relay_settings() {
        let config = AppConfig::default();
        let settings = config.relay_settings();
        let defaults = RelaySettings::default();

        assert_eq!(settings.endpoint, defaults.endpoint);
        assert_eq!(settings.request_timeout, defaults.request_timeout);
        assert_eq!(settings.heartbeat.interval, defaults.heartbeat.interval);
        assert_eq!(settings.workers.queue_capacity, defaults.workers.queue_capacity);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [relay]
            endpoint = "http://10.0.0.2:8080"

            [heartbeat]
            interval_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.relay.endpoint, "http://10.0.0.2:8080");
        assert_eq!(config.relay.request_timeout_secs, 30);
        assert_eq!(config.heartbeat.interval_secs, 60);
        assert_eq!(config.heartbeat.initial_retry_secs, 30);
        assert_eq!(config.workers, WorkersSection::default());
    }

    #[test]
    fn test_example_config_round_trips() {
        let rendered = AppConfig::example_config().unwrap();
        let parsed = AppConfig::from_toml(&rendered).unwrap();
        assert_eq!(
            parsed.host.connectivity_target.as_deref(),
            Some("relay.example.com:443")
        );
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(Some("  ".to_string()));
        assert_eq!(config.relay.endpoint, RelaySettings::default().endpoint);

        config.apply_env_overrides(Some("http://localhost:3000".to_string()));
        assert_eq!(config.relay.endpoint, "http://localhost:3000");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.workers.count = 0;
        assert!(matches!(config.validate(), Err(CliError::Config(_))));

        let mut config = AppConfig::default();
        config.relay.endpoint = "mailto:admin@example.com".to_string();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml("[heartbeat]\ninitial_retry_secs = 0").unwrap();
        assert!(matches!(config.validate(), Err(CliError::Config(_))));

        assert!(matches!(
            AppConfig::from_toml("[relay]\nendpoint = 5"),
            Err(CliError::TomlParsing(_))
        ));
    }

    #[test]
    fn test_connectivity_target_from_endpoint() {
        let mut config = AppConfig::default();
        assert_eq!(
            config.connectivity_target().unwrap(),
            "relay.example.com:443"
        );

        config.relay.endpoint = "http://10.0.0.2:8080/base".to_string();
        assert_eq!(config.connectivity_target().unwrap(), "10.0.0.2:8080");

        config.host.connectivity_target = Some("1.1.1.1:53".to_string());
        assert_eq!(config.connectivity_target().unwrap(), "1.1.1.1:53");
    }

    #[test]
    fn test_outbox_path_defaults_to_data_dir() {
        let config = AppConfig::default();
        assert_eq!(
            config.outbox_path(Path::new("/var/lib/smsrelay")),
            PathBuf::from("/var/lib/smsrelay/outbox.jsonl")
        );
    }
}
