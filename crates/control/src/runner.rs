//! Periodic driving of the sampling and enforcement cycles.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::controller::{Controller, CycleReport};
use crate::error::ControlError;

/// A fleet-wide cycle the runner can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleTask {
    Sample,
    Enforce,
}

impl CycleTask {
    pub async fn run_once(&self, controller: &Controller) -> Result<CycleReport, ControlError> {
        let now = Utc::now();
        match self {
            CycleTask::Sample => controller.sample_all(now).await,
            CycleTask::Enforce => controller.enforce_all(now).await,
        }
    }
}

impl std::fmt::Display for CycleTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleTask::Sample => write!(f, "sample"),
            CycleTask::Enforce => write!(f, "enforce"),
        }
    }
}

/// Run `task` every `period` until `shutdown` is notified (`notify_waiters`).
///
/// Each cycle is awaited before the next tick is taken, so cycles of the
/// same task never overlap; ticks missed while a cycle runs are skipped.
/// Returns the number of cycles run.
pub async fn run_periodic(
    controller: Arc<Controller>,
    task: CycleTask,
    period: Duration,
    shutdown: Arc<Notify>,
) -> usize {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(%task, period_secs = period.as_secs(), "periodic runner started");

    // Registered up front so a notification sent mid-cycle is not lost.
    let stopped = shutdown.notified();
    tokio::pin!(stopped);
    stopped.as_mut().enable();

    let mut cycles = 0;
    loop {
        tokio::select! {
            _ = &mut stopped => break,
            _ = interval.tick() => {}
        }

        if let Err(e) = task.run_once(&controller).await {
            error!(%task, error = %e, "cycle failed");
        }
        cycles += 1;
    }

    info!(%task, cycles, "periodic runner stopped");
    cycles
}
