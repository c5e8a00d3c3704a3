//! Error types for the SMS relay
//!
//! The taxonomy separates conditions the heartbeat scheduler treats as
//! transient (`ConnectivityUnavailable`) from configuration faults and
//! transport faults, which terminate an attempt without retry. A non-2xx
//! reply from the relay endpoint is not represented here: it is
//! recorded as a status code on the dispatch outcome.

// ----------------------------------------------------------------------------
// Host Errors
// ----------------------------------------------------------------------------

/// Faults reported by host-provided capabilities (SMS send, storage media)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("Capability unavailable: {0}")]
    Unavailable(String),
    #[error("Capability rejected request: {0}")]
    Rejected(String),
    #[error("Host I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for HostError {
    fn from(err: std::io::Error) -> Self {
        HostError::Io(err.to_string())
    }
}

// ----------------------------------------------------------------------------
// Relay Error
// ----------------------------------------------------------------------------

/// Main error type for relay operations
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("No network connectivity available")]
    ConnectivityUnavailable,

    #[error("Required configuration missing: {field}")]
    ConfigurationMissing { field: &'static str },

    #[error("Transport failure: {reason}")]
    Transport { reason: String },

    #[error("Relay request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Local send failed: {reason}")]
    LocalSend { reason: String },

    #[error("Storage error: {reason}")]
    Storage { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Relay queue full (capacity: {capacity})")]
    QueueFull { capacity: usize },

    #[error("Relay is shut down")]
    Shutdown,

    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },
}

impl RelayError {
    /// Create a transport error
    pub fn transport_error(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Create a storage error
    pub fn storage_error(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Whether this error is a network/IO fault during a send
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    /// Whether this error should make the scheduler retry the tick
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectivityUnavailable)
    }
}

impl From<HostError> for RelayError {
    fn from(err: HostError) -> Self {
        RelayError::LocalSend {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::storage_error(err.to_string())
    }
}

/// Result type alias for relay operations
pub type RelayResult<T> = std::result::Result<T, RelayError>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
