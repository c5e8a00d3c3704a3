//! Background tasks owned by the runtime
//!
//! - `WorkerPool`: bounded pool running remote relay attempts
//! - `HeartbeatDriver`: periodic heartbeat ticks with offline backoff

pub mod heartbeat_driver;
pub mod worker_pool;

pub use heartbeat_driver::{next_delay, HeartbeatDriver};
pub use worker_pool::{Job, WorkerPool};
