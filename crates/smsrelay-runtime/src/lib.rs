//! SMS Relay Runtime
//!
//! The moving parts of the relay, built on `smsrelay-core`:
//! - `Dispatcher`: fans every inbound message out to the local and remote sinks
//! - `HeartbeatScheduler`: one liveness report per tick with a RETRY policy
//! - `WorkerPool` and `HeartbeatDriver`: the background tasks behind them
//! - `HttpRelayTransport`: posts records to the relay endpoint
//! - `RuntimeBuilder`: wires host capabilities into a running `RelayRuntime`

pub mod builder;
pub mod dispatcher;
pub mod heartbeat;
pub mod statistics;
pub mod tasks;
pub mod testing;
pub mod transport;

pub use builder::{RelayRuntime, RuntimeBuilder, ShutdownSummary};
pub use dispatcher::{DispatchReport, Dispatcher, PendingOutcome};
pub use heartbeat::{HeartbeatScheduler, SchedulerState, TickOutcome};
pub use statistics::{OutcomeStatistics, SinkStatistics, StatisticsSnapshot};
pub use tasks::{HeartbeatDriver, WorkerPool};
pub use transport::{HttpRelayTransport, RelayTransport};

// Re-export core types for convenience
pub use smsrelay_core::{
    DispatchOutcome, InboundMessage, RelayError, RelayResult, RelaySettings, SinkKind,
};
