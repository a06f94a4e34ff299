//! Single-permit admission gate.
//!
//! At most one request holds the permit at a time. Everyone else is turned
//! away immediately; there is no queue and no waiting.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("too many requests")]
pub struct Rejected;

#[derive(Debug, Clone)]
pub struct ReceiverGate {
    permit: Arc<Semaphore>,
}

impl Default for ReceiverGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiverGate {
    pub fn new() -> Self {
        Self {
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    /// Non-blocking: either hands out the permit or rejects on the spot.
    pub fn admit(&self) -> Result<GatePermit, Rejected> {
        Arc::clone(&self.permit)
            .try_acquire_owned()
            .map(|permit| GatePermit { _permit: permit })
            .map_err(|_| Rejected)
    }

    pub fn is_busy(&self) -> bool {
        self.permit.available_permits() == 0
    }
}

/// Proof of admission. The permit goes back to the gate when this is dropped,
/// including when the request future is cancelled mid-work.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Simulates the unit of work, then releases the permit.
    pub async fn hold_for(self, work: Duration) {
        tokio::time::sleep(work).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_admission_is_rejected_while_first_is_held() {
        let gate = ReceiverGate::new();

        let first = gate.admit().unwrap();
        assert!(gate.is_busy());
        assert_eq!(gate.admit().unwrap_err(), Rejected);

        drop(first);
        assert!(!gate.is_busy());
        assert!(gate.admit().is_ok());
    }

    #[test]
    fn clones_share_the_same_permit() {
        let gate = ReceiverGate::new();
        let other = gate.clone();

        let _held = gate.admit().unwrap();

        assert!(other.admit().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn permit_returns_after_the_work_delay() {
        let gate = ReceiverGate::new();
        let permit = gate.admit().unwrap();
        let work = tokio::spawn(permit.hold_for(Duration::from_secs(1)));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(gate.admit().is_err());

        work.await.unwrap();
        assert!(gate.admit().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_work_still_releases() {
        let gate = ReceiverGate::new();
        let permit = gate.admit().unwrap();
        let work = tokio::spawn(permit.hold_for(Duration::from_secs(10)));

        tokio::task::yield_now().await;
        work.abort();
        let _ = work.await;

        assert!(gate.admit().is_ok());
    }
}
