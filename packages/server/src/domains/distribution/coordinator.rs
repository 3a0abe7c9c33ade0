//! Serializes cycles and force-publishes, and keeps scheduler status.
//!
//! At most one cycle or force-publish runs at a time. A scheduled tick that
//! finds one in progress is skipped; a manual request gets
//! [`CoordinatorError::Busy`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::cycle::{
    with_store_timeout, CycleRunner, CycleState, CycleStatus, CycleSummary, CycleTrigger,
    JobOutcome, PublishJobError,
};
use crate::kernel::BaseCursorStore;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("a distribution cycle is already in progress")]
    Busy,

    #[error(transparent)]
    Publish(#[from] PublishJobError),

    /// The task running the work panicked or was cancelled
    #[error("publish task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub scheduler_running: bool,
    pub interval_seconds: u64,
    pub cycle_in_progress: bool,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub total_runs: u64,
    pub failed_runs: u64,
    pub skipped_ticks: u64,
    pub high_water_mark: Option<DateTime<Utc>>,
    pub last_summary: Option<CycleSummary>,
}

#[derive(Debug, Default)]
struct Tracker {
    /// `None` until loaded from the cursor store
    cycle_state: Option<CycleState>,
    scheduler_running: bool,
    last_started_at: Option<DateTime<Utc>>,
    last_finished_at: Option<DateTime<Utc>>,
    next_run_at: Option<DateTime<Utc>>,
    total_runs: u64,
    failed_runs: u64,
    skipped_ticks: u64,
    last_summary: Option<CycleSummary>,
}

/// Everything a cycle task needs after its caller has gone away.
struct CycleTask {
    runner: Arc<CycleRunner>,
    cursor: Arc<dyn BaseCursorStore>,
    tracker: Arc<RwLock<Tracker>>,
}

impl CycleTask {
    /// Runs with the lock held; `_guard` is released when the cycle and its
    /// bookkeeping are done, even if nobody awaits the result.
    async fn run(self, trigger: CycleTrigger, _guard: OwnedMutexGuard<()>) -> CycleSummary {
        let started_at = Utc::now();
        self.tracker.write().await.last_started_at = Some(started_at);

        let state = self.current_state().await;

        // Spawned so a panic inside the cycle becomes a failed summary
        let runner = self.runner.clone();
        let handle =
            tokio::spawn(async move { runner.run_cycle(state, trigger, started_at).await });

        let (next_state, summary) = match handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Distribution cycle task aborted");
                (
                    state,
                    CycleSummary::failed(trigger, started_at, format!("cycle task aborted: {}", e)),
                )
            }
        };

        if next_state.high_water_mark != state.high_water_mark {
            if let Some(hwm) = next_state.high_water_mark {
                let save = self.cursor.save(hwm);
                if let Err(e) = with_store_timeout(self.store_timeout(), "save cursor", save).await {
                    tracing::warn!(error = %e, "Failed to persist high-water mark");
                }
            }
        }

        let mut tracker = self.tracker.write().await;
        tracker.cycle_state = Some(next_state);
        tracker.last_finished_at = summary.finished_at;
        tracker.total_runs += 1;
        if summary.status == CycleStatus::Failed {
            tracker.failed_runs += 1;
        }
        tracker.last_summary = Some(summary.clone());
        summary
    }

    async fn current_state(&self) -> CycleState {
        if let Some(state) = self.tracker.read().await.cycle_state {
            return state;
        }

        let load = self.cursor.load();
        match with_store_timeout(self.store_timeout(), "load cursor", load).await {
            Ok(high_water_mark) => CycleState { high_water_mark },
            Err(e) => {
                tracing::warn!(error = %e, "Could not load high-water mark, starting from lookback window");
                CycleState::default()
            }
        }
    }

    fn store_timeout(&self) -> Duration {
        self.runner.settings().store_timeout
    }
}

pub struct CycleCoordinator {
    runner: Arc<CycleRunner>,
    cursor: Arc<dyn BaseCursorStore>,
    interval: Duration,
    running: Arc<Mutex<()>>,
    tracker: Arc<RwLock<Tracker>>,
}

impl CycleCoordinator {
    pub fn new(runner: Arc<CycleRunner>, interval: Duration) -> Self {
        let cursor = runner.deps().cursor.clone();
        Self {
            runner,
            cursor,
            interval,
            running: Arc::new(Mutex::new(())),
            tracker: Arc::new(RwLock::new(Tracker::default())),
        }
    }

    pub fn runner(&self) -> &CycleRunner {
        &self.runner
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn mark_scheduler_started(&self) {
        let mut tracker = self.tracker.write().await;
        tracker.scheduler_running = true;
        tracker.next_run_at = Some(Utc::now() + self.chrono_interval());
    }

    /// Scheduled entry point. Returns `None` when the tick was skipped.
    pub async fn tick(&self) -> Option<CycleSummary> {
        let Ok(guard) = self.running.clone().try_lock_owned() else {
            let mut tracker = self.tracker.write().await;
            tracker.skipped_ticks += 1;
            tracker.next_run_at = Some(Utc::now() + self.chrono_interval());
            tracing::info!("Previous cycle still running, skipping scheduled tick");
            return None;
        };

        let summary = self.run_locked(CycleTrigger::Scheduled, guard).await;
        self.tracker.write().await.next_run_at = Some(Utc::now() + self.chrono_interval());
        Some(summary)
    }

    /// Manual entry point; runs the cycle to completion before returning.
    ///
    /// Dropping the returned future does not stop the cycle; it keeps the lock
    /// until it finishes.
    pub async fn trigger(&self) -> Result<CycleSummary, CoordinatorError> {
        let Ok(guard) = self.running.clone().try_lock_owned() else {
            tracing::info!("Manual trigger rejected, cycle in progress");
            return Err(CoordinatorError::Busy);
        };
        Ok(self.run_locked(CycleTrigger::Manual, guard).await)
    }

    /// Force-publish a single job under the same lock as cycles.
    pub async fn publish_job(&self, job_id: &str) -> Result<JobOutcome, CoordinatorError> {
        let Ok(guard) = self.running.clone().try_lock_owned() else {
            return Err(CoordinatorError::Busy);
        };

        let runner = self.runner.clone();
        let job_id = job_id.to_string();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            runner.publish_job(&job_id).await
        });

        match handle.await {
            Ok(outcome) => Ok(outcome?),
            Err(e) => {
                tracing::error!(error = %e, "Force-publish task aborted");
                Err(CoordinatorError::Aborted(e.to_string()))
            }
        }
    }

    pub async fn status(&self) -> SchedulerStatus {
        let cycle_in_progress = self.running.try_lock().is_err();
        let tracker = self.tracker.read().await;
        SchedulerStatus {
            scheduler_running: tracker.scheduler_running,
            interval_seconds: self.interval.as_secs(),
            cycle_in_progress,
            last_started_at: tracker.last_started_at,
            last_finished_at: tracker.last_finished_at,
            next_run_at: tracker.next_run_at,
            total_runs: tracker.total_runs,
            failed_runs: tracker.failed_runs,
            skipped_ticks: tracker.skipped_ticks,
            high_water_mark: tracker.cycle_state.and_then(|s| s.high_water_mark),
            last_summary: tracker.last_summary.clone(),
        }
    }

    async fn run_locked(&self, trigger: CycleTrigger, guard: OwnedMutexGuard<()>) -> CycleSummary {
        let task = CycleTask {
            runner: self.runner.clone(),
            cursor: self.cursor.clone(),
            tracker: self.tracker.clone(),
        };
        let started_at = Utc::now();
        let handle = tokio::spawn(task.run(trigger, guard));

        match handle.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Cycle bookkeeping task aborted");
                CycleSummary::failed(trigger, started_at, format!("cycle task aborted: {}", e))
            }
        }
    }

    fn chrono_interval(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.interval).unwrap_or_else(|_| chrono::Duration::seconds(60))
    }
}
