//! Outcome statistics
//!
//! Dispatch outcomes are observability-only. This collects them into
//! per-sink counters plus heartbeat tick totals.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use smsrelay_core::{DispatchOutcome, SinkKind};

use crate::heartbeat::TickOutcome;

// ----------------------------------------------------------------------------
// Counters
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SinkCounters {
    attempts: AtomicU64,
    completed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

impl SinkCounters {
    fn record(&self, outcome: &DispatchOutcome) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if outcome.skipped {
            self.skipped.fetch_add(1, Ordering::Relaxed);
        } else if outcome.success {
            self.completed.fetch_add(1, Ordering::Relaxed);
            if outcome.is_remote_rejection() {
                self.rejected.fetch_add(1, Ordering::Relaxed);
            }
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> SinkStatistics {
        SinkStatistics {
            attempts: self.attempts.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Shared, lock-free outcome counters
#[derive(Debug, Default)]
pub struct OutcomeStatistics {
    local: SinkCounters,
    remote: SinkCounters,
    heartbeat: SinkCounters,
    ticks_succeeded: AtomicU64,
    ticks_retried: AtomicU64,
    ticks_failed: AtomicU64,
}

impl OutcomeStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &DispatchOutcome) {
        match outcome.sink {
            SinkKind::Local => self.local.record(outcome),
            SinkKind::Remote => self.remote.record(outcome),
            SinkKind::Heartbeat => self.heartbeat.record(outcome),
        }
    }

    pub fn record_tick(&self, outcome: &TickOutcome) {
        let counter = match outcome {
            TickOutcome::Success { .. } => &self.ticks_succeeded,
            TickOutcome::Retry => &self.ticks_retried,
            TickOutcome::Failure { .. } => &self.ticks_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            local: self.local.snapshot(),
            remote: self.remote.snapshot(),
            heartbeat: self.heartbeat.snapshot(),
            ticks_succeeded: self.ticks_succeeded.load(Ordering::Relaxed),
            ticks_retried: self.ticks_retried.load(Ordering::Relaxed),
            ticks_failed: self.ticks_failed.load(Ordering::Relaxed),
        }
    }
}

// ----------------------------------------------------------------------------
// Snapshots
// ----------------------------------------------------------------------------

/// Counters for one sink
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SinkStatistics {
    pub attempts: u64,
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Completed attempts answered with a non-2xx status
    pub rejected: u64,
}

impl SinkStatistics {
    /// Fraction of attempts that did not fail
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            (self.completed + self.skipped) as f64 / self.attempts as f64
        }
    }
}

/// Point-in-time copy of all counters
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    pub local: SinkStatistics,
    pub remote: SinkStatistics,
    pub heartbeat: SinkStatistics,
    pub ticks_succeeded: u64,
    pub ticks_retried: u64,
    pub ticks_failed: u64,
}

impl StatisticsSnapshot {
    pub fn sink(&self, sink: SinkKind) -> &SinkStatistics {
        match sink {
            SinkKind::Local => &self.local,
            SinkKind::Remote => &self.remote,
            SinkKind::Heartbeat => &self.heartbeat,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
