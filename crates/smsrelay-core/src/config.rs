//! Runtime settings for the relay
//!
//! Endpoint, request timeout, worker pool sizing and heartbeat timing. These
//! are fixed for the lifetime of a runtime; the administrator address and
//! credential are mutable state and live in the configuration store instead.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{RelayError, RelayResult};

// ----------------------------------------------------------------------------
// Relay Settings
// ----------------------------------------------------------------------------

/// Complete relay runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Base address of the relay backend
    pub endpoint: String,
    /// Upper bound on a single relay request
    pub request_timeout: Duration,
    /// Remote sink worker pool
    pub workers: WorkerPoolConfig,
    /// Heartbeat timing
    pub heartbeat: HeartbeatConfig,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            endpoint: "https://relay.example.com".to_string(),
            request_timeout: Duration::from_secs(30),
            workers: WorkerPoolConfig::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl RelaySettings {
    /// Settings with short timings for tests
    pub fn testing() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9".to_string(),
            request_timeout: Duration::from_millis(500),
            workers: WorkerPoolConfig {
                workers: 2,
                queue_capacity: 16,
            },
            heartbeat: HeartbeatConfig::testing(),
        }
    }

    /// Parsed endpoint URL
    pub fn endpoint_url(&self) -> RelayResult<Url> {
        let url = Url::parse(&self.endpoint).map_err(|e| {
            RelayError::invalid_configuration(format!(
                "Invalid endpoint {}: {}",
                self.endpoint,
                e
            ))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(RelayError::invalid_configuration(format!(
                "Unsupported endpoint scheme: {}",
                other
            ))),
        }
    }

    /// Validate the settings for consistency
    pub fn validate(&self) -> RelayResult<()> {
        self.endpoint_url()?;

        if self.request_timeout.is_zero() {
            return Err(RelayError::invalid_configuration(
                "Request timeout must be greater than 0",
            ));
        }
        if self.workers.workers == 0 {
            return Err(RelayError::invalid_configuration(
                "Worker count must be greater than 0",
            ));
        }
        if self.workers.queue_capacity == 0 {
            return Err(RelayError::invalid_configuration(
                "Queue capacity must be greater than 0",
            ));
        }
        self.heartbeat.validate()
    }
}

// ----------------------------------------------------------------------------
// Worker Pool Configuration
// ----------------------------------------------------------------------------

/// Sizing of the bounded pool that runs remote relay attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Number of concurrent relay workers
    pub workers: usize,
    /// Pending attempts held before new ones are rejected
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
        }
    }
}

// ----------------------------------------------------------------------------
// Heartbeat Configuration
// ----------------------------------------------------------------------------

/// Heartbeat interval and offline retry backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Time between heartbeat ticks
    pub interval: Duration,
    /// First delay after a tick that found no connectivity
    pub initial_retry_delay: Duration,
    /// Cap for the retry delay
    pub max_retry_delay: Duration,
    /// Exponential backoff multiplier
    pub backoff_multiplier: f32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            initial_retry_delay: Duration::from_secs(30),
            max_retry_delay: Duration::from_secs(10 * 60),
            backoff_multiplier: 2.0,
        }
    }
}

impl HeartbeatConfig {
    pub fn testing() -> Self {
        Self {
            interval: Duration::from_millis(200),
            initial_retry_delay: Duration::from_millis(10),
            max_retry_delay: Duration::from_millis(80),
            backoff_multiplier: 2.0,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.min(32) as i32) as f64;
        let delay = self.initial_retry_delay.as_secs_f64() * factor;
        let capped = delay.min(self.max_retry_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    pub fn validate(&self) -> RelayResult<()> {
        if self.interval.is_zero() {
            return Err(RelayError::invalid_configuration(
                "Heartbeat interval must be greater than 0",
            ));
        }
        if self.initial_retry_delay.is_zero() {
            return Err(RelayError::invalid_configuration(
                "Initial retry delay must be greater than 0",
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(RelayError::invalid_configuration(
                "Backoff multiplier must be at least 1.0",
            ));
        }
        if self.initial_retry_delay > self.max_retry_delay {
            return Err(RelayError::invalid_configuration(
                "Initial retry delay exceeds maximum retry delay",
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(RelaySettings::default().validate().is_ok());
        assert!(RelaySettings::testing().validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = RelaySettings::default();
        settings.endpoint = "ftp://relay.example.com".to_string();
        assert!(settings.validate().is_err());

        let mut settings = RelaySettings::default();
        settings.endpoint = "not a url".to_string();
        assert!(settings.validate().is_err());

        let mut settings = RelaySettings::default();
        settings.workers.workers = 0;
        assert!(settings.validate().is_err());

        let mut settings = RelaySettings::default();
        settings.workers.queue_capacity = 0;
        assert!(settings.validate().is_err());

        let mut settings = RelaySettings::default();
        settings.heartbeat.backoff_multiplier = 0.5;
        assert!(settings.validate().is_err());

        // A zero first delay would re-tick an offline device in a tight loop
        let mut settings = RelaySettings::default();
        settings.heartbeat.initial_retry_delay = Duration::ZERO;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_retry_delay_backoff_is_capped() {
        let config = HeartbeatConfig::default();
        assert_eq!(config.retry_delay(0), Duration::from_secs(30));
        assert_eq!(config.retry_delay(1), Duration::from_secs(60));
        assert_eq!(config.retry_delay(2), Duration::from_secs(120));
        assert_eq!(config.retry_delay(10), Duration::from_secs(600));
        assert_eq!(config.retry_delay(u32::MAX), Duration::from_secs(600));
    }
}
