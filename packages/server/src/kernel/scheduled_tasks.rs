//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! - Distribution cycle every `POLLING_INTERVAL_SECONDS`
//! - Daily pruning of old delivery records
//!
//! # Architecture
//!
//! ```text
//! Scheduler (every N seconds)
//!     │
//!     └─► CycleCoordinator::tick()
//!             └─► skipped if a cycle or force-publish holds the lock
//!
//! Scheduler (03:00 UTC daily)
//!     │
//!     └─► ledger.prune(now - retention)
//! ```

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::distribution::CycleCoordinator;
use crate::kernel::BaseDeliveryLedger;

/// Daily at 03:00 (sec min hour day month weekday)
pub const RETENTION_SCHEDULE: &str = "0 0 3 * * *";

/// Start all scheduled tasks
pub async fn start_scheduler(
    coordinator: Arc<CycleCoordinator>,
    retention_days: i64,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let interval = coordinator.interval();

    let tick_coordinator = coordinator.clone();
    let cycle_job = Job::new_repeated_async(interval, move |_uuid, _lock| {
        let coordinator = tick_coordinator.clone();
        Box::pin(async move {
            coordinator.tick().await;
        })
    })?;

    scheduler.add(cycle_job).await?;

    let ledger = coordinator.runner().deps().ledger.clone();
    let retention_job = Job::new_async(RETENTION_SCHEDULE, move |_uuid, _lock| {
        let ledger = ledger.clone();
        Box::pin(async move {
            if let Err(e) = prune_deliveries(ledger.as_ref(), retention_days).await {
                tracing::error!("Delivery retention task failed: {}", e);
            }
        })
    })?;

    scheduler.add(retention_job).await?;
    scheduler.start().await?;
    coordinator.mark_scheduler_started().await;

    tracing::info!(
        interval_seconds = interval.as_secs(),
        retention_days,
        "Scheduled tasks started (distribution cycle, daily delivery retention)"
    );
    Ok(scheduler)
}

/// Delete ledger rows older than `retention_days`.
pub async fn prune_deliveries(ledger: &dyn BaseDeliveryLedger, retention_days: i64) -> Result<u64> {
    let cutoff = Utc::now() - chrono::Duration::days(retention_days);
    let removed = ledger.prune(cutoff).await?;
    tracing::info!(removed, cutoff = %cutoff, "Pruned old delivery records");
    Ok(removed)
}
