//! Wire records posted to the relay endpoint
//!
//! Field order matches the JSON layout the backend expects:
//! `{"sender","content","timestamp","deviceId"}` for messages and
//! `{"deviceId","timestamp","type"}` for heartbeats.

use serde::{Deserialize, Serialize};

use crate::errors::RelayResult;
use crate::types::{DeviceIdentity, InboundMessage};

/// Path of the message relay route, relative to the endpoint base
pub const MESSAGES_PATH: &str = "/api/messages";
/// Path of the heartbeat route, relative to the endpoint base
pub const HEARTBEAT_PATH: &str = "/api/heartbeat";

const HEARTBEAT_TYPE: &str = "heartbeat";

// ----------------------------------------------------------------------------
// Message Record
// ----------------------------------------------------------------------------

/// Structured copy of an inbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub sender: String,
    pub content: String,
    pub timestamp: u64,
    pub device_id: String,
}

impl MessageRecord {
    pub fn from_message(message: &InboundMessage, identity: &DeviceIdentity) -> Self {
        Self {
            sender: message.sender().into(),
            content: message.body().into(),
            timestamp: message.received_at_millis(),
            device_id: identity.id.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Heartbeat Record
// ----------------------------------------------------------------------------

/// Liveness report sent by the heartbeat scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRecord {
    pub device_id: String,
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl HeartbeatRecord {
    pub fn new(identity: &DeviceIdentity, timestamp: u64) -> Self {
        Self {
            device_id: identity.id.clone(),
            timestamp,
            kind: HEARTBEAT_TYPE.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Relay Request
// ----------------------------------------------------------------------------

/// A record addressed to one of the relay routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayRequest {
    Message(MessageRecord),
    Heartbeat(HeartbeatRecord),
}

impl RelayRequest {
    pub fn path(&self) -> &'static str {
        match self {
            RelayRequest::Message(_) => MESSAGES_PATH,
            RelayRequest::Heartbeat(_) => HEARTBEAT_PATH,
        }
    }

    /// JSON body bytes for this request
    pub fn to_json(&self) -> RelayResult<Vec<u8>> {
        let body = match self {
            RelayRequest::Message(record) => serde_json::to_vec(record)?,
            RelayRequest::Heartbeat(record) => serde_json::to_vec(record)?,
        };
        Ok(body)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
