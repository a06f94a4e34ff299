use crate::client::{CallOutcome, PongClient};
use crate::rate_limiter::{AdmissionControl, LimiterError};
use crate::schedule::{SchedulerHandle, WindowScheduler};
use crate::stats::PingStats;
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// What one tick did. The outbound call, if any, keeps running on its own task.
#[derive(Debug)]
pub enum Attempt {
    Sent {
        trace_id: String,
        call: JoinHandle<CallOutcome>,
    },
    /// The fleet-wide window was already full.
    SkippedLocally { trace_id: String },
    /// No admission decision could be made; nothing was sent.
    LimiterUnavailable { trace_id: String },
}

impl Attempt {
    pub fn trace_id(&self) -> &str {
        match self {
            Attempt::Sent { trace_id, .. }
            | Attempt::SkippedLocally { trace_id }
            | Attempt::LimiterUnavailable { trace_id } => trace_id,
        }
    }

    pub fn was_sent(&self) -> bool {
        matches!(self, Attempt::Sent { .. })
    }

    /// Waits for the outbound call. `None` when nothing was sent.
    pub async fn outcome(self) -> Option<CallOutcome> {
        match self {
            Attempt::Sent { call, .. } => Some(call.await.unwrap_or_else(|e| {
                CallOutcome::Failure {
                    detail: format!("ping task did not complete: {e}"),
                }
            })),
            _ => None,
        }
    }
}

/// Caller side of the fleet: asks the shared limiter, then pings.
pub struct Pinger<L, C> {
    limiter: Arc<L>,
    client: Arc<C>,
    stats: Arc<PingStats>,
}

impl<L, C> Clone for Pinger<L, C> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            client: Arc::clone(&self.client),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<L, C> Pinger<L, C>
where
    L: AdmissionControl,
    C: PongClient,
{
    pub fn new(limiter: L, client: C) -> Self {
        Self {
            limiter: Arc::new(limiter),
            client: Arc::new(client),
            stats: Arc::new(PingStats::new()),
        }
    }

    pub fn stats(&self) -> &PingStats {
        &self.stats
    }

    /// Runs one tick: tags it with a fresh trace id, consults the limiter
    /// and, when admitted, spawns the outbound call without waiting for it.
    pub async fn attempt(&self) -> Attempt {
        let trace_id = Uuid::new_v4().to_string();
        self.stats.attempts.fetch_add(1, Ordering::Relaxed);

        let limiter = Arc::clone(&self.limiter);
        let admitted = tokio::task::spawn_blocking(move || limiter.try_acquire())
            .await
            .unwrap_or_else(|e| Err(LimiterError::Task(e.to_string())));

        match admitted {
            Ok(true) => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
                info!(trace_id = %trace_id, at = %Utc::now().to_rfc3339(), "Ping sent: hello");
                let call = self.spawn_call(trace_id.clone());
                Attempt::Sent { trace_id, call }
            }
            Ok(false) => {
                self.stats.skipped_locally.fetch_add(1, Ordering::Relaxed);
                info!(
                    trace_id = %trace_id,
                    at = %Utc::now().to_rfc3339(),
                    "Request not sent due to rate limit"
                );
                Attempt::SkippedLocally { trace_id }
            }
            Err(e) => {
                self.stats.limiter_unavailable.fetch_add(1, Ordering::Relaxed);
                error!(
                    trace_id = %trace_id,
                    at = %Utc::now().to_rfc3339(),
                    error = %e,
                    "Rate limiter unavailable, request not sent"
                );
                Attempt::LimiterUnavailable { trace_id }
            }
        }
    }

    /// Drives [`Pinger::attempt`] from the scheduler until the handle stops.
    pub fn schedule(&self, scheduler: &WindowScheduler) -> SchedulerHandle {
        let pinger = self.clone();
        scheduler.start(move || {
            let pinger = pinger.clone();
            async move {
                // The call task is detached; its outcome is logged there.
                let _ = pinger.attempt().await;
            }
        })
    }

    fn spawn_call(&self, trace_id: String) -> JoinHandle<CallOutcome> {
        let client = Arc::clone(&self.client);
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            let outcome = client.ping(&trace_id).await;
            stats.record_outcome(&outcome);
            let at = Utc::now().to_rfc3339();
            match &outcome {
                CallOutcome::Success { body } => {
                    info!(trace_id = %trace_id, at = %at, response = %body, "Pong responded");
                }
                CallOutcome::RateLimited => {
                    warn!(trace_id = %trace_id, at = %at, "Pong rejected the request with 429");
                }
                CallOutcome::Failure { detail } => {
                    error!(trace_id = %trace_id, at = %at, error = %detail, "Pong call failed");
                }
            }
            outcome
        })
    }
}
