//! Per-process attempt counters

use crate::client::CallOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PingStats {
    pub attempts: AtomicU64,
    pub sent: AtomicU64,
    pub skipped_locally: AtomicU64,
    pub limiter_unavailable: AtomicU64,
    pub succeeded: AtomicU64,
    pub rejected_by_pong: AtomicU64,
    pub failed: AtomicU64,
}

impl PingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&self, outcome: &CallOutcome) {
        let counter = match outcome {
            CallOutcome::Success { .. } => &self.succeeded,
            CallOutcome::RateLimited => &self.rejected_by_pong,
            CallOutcome::Failure { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PingStatsSnapshot {
        PingStatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            skipped_locally: self.skipped_locally.load(Ordering::Relaxed),
            limiter_unavailable: self.limiter_unavailable.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            rejected_by_pong: self.rejected_by_pong.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PingStatsSnapshot {
    pub attempts: u64,
    pub sent: u64,
    pub skipped_locally: u64,
    pub limiter_unavailable: u64,
    pub succeeded: u64,
    pub rejected_by_pong: u64,
    pub failed: u64,
}
