//! Core data model for the SMS relay
//!
//! Inbound messages, the installation identity, the mutable relay
//! configuration and the per-attempt dispatch outcome.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::RelayError;

// ----------------------------------------------------------------------------
// Inbound Message
// ----------------------------------------------------------------------------

/// A short message captured by the ingestion adapter
///
/// Immutable once captured and consumed exactly once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    sender: String,
    body: String,
    received_at_millis: u64,
}

impl InboundMessage {
    pub fn new(sender: impl Into<String>, body: impl Into<String>, received_at_millis: u64) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            received_at_millis,
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn received_at_millis(&self) -> u64 {
        self.received_at_millis
    }

    /// Text of the envelope re-sent to the administrator address
    pub fn forwarding_text(&self) -> String {
        format!("From: {}\nMessage: {}", self.sender, self.body)
    }
}

// ----------------------------------------------------------------------------
// Device Identity
// ----------------------------------------------------------------------------

/// Stable identifier of this installation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub id: String,
}

impl DeviceIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Synthesize an identifier from a host identifier and the creation time
    pub fn synthesize(hardware_id: &str, created_at_millis: u64) -> Self {
        Self {
            id: format!("{}_{}", hardware_id, created_at_millis),
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

// ----------------------------------------------------------------------------
// Relay Configuration
// ----------------------------------------------------------------------------

/// Snapshot of the administrator address and relay credential
///
/// Values are passed through unvalidated; a malformed address only surfaces
/// as a downstream delivery failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub admin_address: Option<String>,
    pub api_credential: Option<String>,
}

impl RelayConfig {
    /// Admin address, treating an empty string as unset
    pub fn admin_address(&self) -> Option<&str> {
        non_empty(self.admin_address.as_deref())
    }

    /// Credential, treating an empty string as unset
    pub fn credential(&self) -> Option<&str> {
        non_empty(self.api_credential.as_deref())
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

// ----------------------------------------------------------------------------
// Dispatch Outcome
// ----------------------------------------------------------------------------

/// Delivery target of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SinkKind {
    Local,
    Remote,
    Heartbeat,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Local => write!(f, "LOCAL"),
            SinkKind::Remote => write!(f, "REMOTE"),
            SinkKind::Heartbeat => write!(f, "HEARTBEAT"),
        }
    }
}

/// Recorded result of one sink attempt
///
/// Used for logging and statistics only; never persisted or retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub sink: SinkKind,
    pub success: bool,
    pub skipped: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl DispatchOutcome {
    /// Attempt completed; `status_code` is the HTTP status for remote sinks
    pub fn completed(sink: SinkKind, status_code: Option<u16>) -> Self {
        Self {
            sink,
            success: true,
            skipped: false,
            status_code,
            error: None,
        }
    }

    /// Nothing to do for this sink; counts as success
    pub fn skipped(sink: SinkKind) -> Self {
        Self {
            sink,
            success: true,
            skipped: true,
            status_code: None,
            error: None,
        }
    }

    pub fn failed(sink: SinkKind, error: &RelayError) -> Self {
        Self {
            sink,
            success: false,
            skipped: false,
            status_code: None,
            error: Some(error.to_string()),
        }
    }

    /// Completed attempt whose HTTP status was outside 2xx
    pub fn is_remote_rejection(&self) -> bool {
        self.success && matches!(self.status_code, Some(code) if !(200..300).contains(&code))
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped {
            return write!(f, "{}: skipped", self.sink);
        }
        match (&self.error, self.status_code) {
            (Some(error), _) => write!(f, "{}: failed ({})", self.sink, error),
            (None, Some(code)) => write!(f, "{}: completed (status {})", self.sink, code),
            (None, None) => write!(f, "{}: completed", self.sink),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
