//! SMS Relay Core
//!
//! Foundational types for the SMS relay: the inbound message and dispatch
//! outcome model, the wire records posted to the relay backend, the
//! key-value persistence abstraction with the identity and configuration
//! stores built on it, and the host capability traits the runtime depends on.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod config_store;
pub mod errors;
pub mod host;
pub mod identity;
pub mod records;
pub mod storage;
pub mod time;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{HeartbeatConfig, RelaySettings, WorkerPoolConfig};
pub use config_store::ConfigStore;
pub use errors::{HostError, RelayError, RelayResult};
pub use host::{ConnectivityProbe, FixedHardwareId, HardwareIdSource, SmsSender, StaticConnectivity};
pub use identity::IdentityStore;
pub use records::{HeartbeatRecord, MessageRecord, RelayRequest, HEARTBEAT_PATH, MESSAGES_PATH};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use types::{DeviceIdentity, DispatchOutcome, InboundMessage, RelayConfig, SinkKind};
