//! Phase-staggered once-per-second trigger.
//!
//! Every caller in the fleet fires once per second, but each one is shifted
//! by its own slice of the second so that two correctly configured machines
//! never fire in the same sub-window.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, info_span, Instrument};

pub const PERIOD_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("fleet size must be at least 1")]
    EmptyFleet,
    #[error("machine id {machine_id} is outside 1..={total_machines}")]
    MachineOutOfRange { machine_id: u32, total_machines: u32 },
}

/// Where in each second a given machine fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleAssignment {
    machine_id: u32,
    total_machines: u32,
    window_size_ms: u64,
    start_offset_ms: u64,
}

impl ScheduleAssignment {
    pub fn new(machine_id: u32, total_machines: u32) -> Result<Self, ScheduleError> {
        if total_machines == 0 {
            return Err(ScheduleError::EmptyFleet);
        }
        if machine_id == 0 || machine_id > total_machines {
            return Err(ScheduleError::MachineOutOfRange {
                machine_id,
                total_machines,
            });
        }
        let window_size_ms = PERIOD_MS / u64::from(total_machines);
        Ok(Self {
            machine_id,
            total_machines,
            window_size_ms,
            start_offset_ms: u64::from(machine_id - 1) * window_size_ms,
        })
    }

    pub fn machine_id(&self) -> u32 {
        self.machine_id
    }

    pub fn total_machines(&self) -> u32 {
        self.total_machines
    }

    pub fn window_size_ms(&self) -> u64 {
        self.window_size_ms
    }

    pub fn start_offset_ms(&self) -> u64 {
        self.start_offset_ms
    }

    pub fn start_offset(&self) -> Duration {
        Duration::from_millis(self.start_offset_ms)
    }
}

#[derive(Debug, Clone)]
pub struct WindowScheduler {
    assignment: ScheduleAssignment,
}

impl WindowScheduler {
    pub fn new(assignment: ScheduleAssignment) -> Self {
        Self { assignment }
    }

    pub fn assignment(&self) -> &ScheduleAssignment {
        &self.assignment
    }

    /// Spawns the trigger loop on the current Tokio runtime.
    ///
    /// `tick` runs at `start_offset` after this call and then every second.
    /// Ticks that fall behind are skipped rather than bunched up, which keeps
    /// later ticks on the original phase.
    pub fn start<F, Fut>(&self, mut tick: F) -> SchedulerHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut stop_rx) = watch::channel(false);
        let fired = Arc::new(AtomicU64::new(0));
        let fired_in_loop = Arc::clone(&fired);
        let assignment = self.assignment;

        let first_tick = Instant::now() + assignment.start_offset();
        let span = info_span!("ping_scheduler", machine_id = assignment.machine_id());

        let task = tokio::spawn(
            async move {
                info!(
                    start_offset_ms = assignment.start_offset_ms(),
                    window_size_ms = assignment.window_size_ms(),
                    total_machines = assignment.total_machines(),
                    "Scheduler started"
                );
                let mut interval =
                    tokio::time::interval_at(first_tick, Duration::from_millis(PERIOD_MS));
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    if *stop_rx.borrow() {
                        break;
                    }
                    tokio::select! {
                        changed = stop_rx.changed() => {
                            if changed.is_err() || *stop_rx.borrow() {
                                break;
                            }
                        }
                        _ = interval.tick() => {
                            fired_in_loop.fetch_add(1, Ordering::Relaxed);
                            tick().await;
                        }
                    }
                }
                debug!("Scheduler stopped");
            }
            .instrument(span),
        );

        SchedulerHandle {
            shutdown,
            fired,
            task,
        }
    }
}

/// Owner of a running trigger loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    fired: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Requests the loop to stop. Safe to call any number of times.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Number of ticks fired so far.
    pub fn ticks(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Stops the loop and waits for an in-progress tick to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        let _ = (&mut self.task).await;
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
        self.task.abort();
    }
}
