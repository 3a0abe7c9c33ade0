//! Postgres-backed implementations of the source, ledger and cursor traits.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domains::distribution::models::{
    DeliveryOutcome, DeliveryRecord, DestinationStats, RelayCursor,
};
use crate::domains::distribution::Destination;
use crate::domains::job_posts::JobPostRow;
use crate::kernel::{BaseCursorStore, BaseDeliveryLedger, BaseJobSource};

/// Reads candidates straight from the job board's `job_posts` table.
pub struct PgJobSource {
    pool: PgPool,
}

impl PgJobSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseJobSource for PgJobSource {
    async fn fetch_candidates(&self, since: DateTime<Utc>) -> Result<Vec<JobPostRow>> {
        JobPostRow::find_published_since(since, &self.pool).await
    }

    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<JobPostRow>> {
        JobPostRow::find_by_ids(ids, &self.pool).await
    }

    async fn get_job(&self, id: &str) -> Result<Option<JobPostRow>> {
        JobPostRow::find_by_id(id, &self.pool).await
    }
}

/// Ledger stored in `job_deliveries`.
pub struct PgDeliveryLedger {
    pool: PgPool,
}

impl PgDeliveryLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseDeliveryLedger for PgDeliveryLedger {
    async fn has_been_delivered(&self, job_id: &str, destination: Destination) -> Result<bool> {
        DeliveryRecord::exists_successful(job_id, destination, &self.pool).await
    }

    async fn failed_attempts(&self, job_id: &str, destination: Destination) -> Result<u32> {
        let count = DeliveryRecord::count_failures(job_id, destination, &self.pool).await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn record_delivery(
        &self,
        job_id: &str,
        destination: Destination,
        outcome: &DeliveryOutcome,
    ) -> Result<()> {
        let inserted = DeliveryRecord::create(job_id, destination, outcome, &self.pool).await?;
        if !inserted {
            tracing::warn!(
                job_id,
                destination = %destination,
                "Job was already recorded as delivered; duplicate success dropped"
            );
        }
        Ok(())
    }

    async fn recently_delivered(
        &self,
        window: chrono::Duration,
        limit: i64,
    ) -> Result<Vec<DeliveryRecord>> {
        DeliveryRecord::find_recent(Utc::now() - window, limit, &self.pool).await
    }

    async fn retryable_job_ids(
        &self,
        since: DateTime<Utc>,
        destinations: &[Destination],
        max_failures: u32,
    ) -> Result<Vec<String>> {
        DeliveryRecord::find_retryable_job_ids(since, destinations, max_failures as i64, &self.pool)
            .await
    }

    async fn deliveries_for_job(&self, job_id: &str) -> Result<Vec<DeliveryRecord>> {
        DeliveryRecord::find_for_job(job_id, &self.pool).await
    }

    async fn stats(&self) -> Result<Vec<DestinationStats>> {
        DeliveryRecord::stats_by_destination(&self.pool).await
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        DeliveryRecord::delete_older_than(cutoff, &self.pool).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// High-water mark stored in `relay_cursors` under a fixed name.
pub struct PgCursorStore {
    pool: PgPool,
    name: String,
}

impl PgCursorStore {
    pub const DEFAULT_NAME: &'static str = "job_posts";

    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            name: Self::DEFAULT_NAME.to_string(),
        }
    }
}

#[async_trait]
impl BaseCursorStore for PgCursorStore {
    async fn load(&self) -> Result<Option<DateTime<Utc>>> {
        RelayCursor::load(&self.name, &self.pool).await
    }

    async fn save(&self, high_water_mark: DateTime<Utc>) -> Result<()> {
        RelayCursor::save(&self.name, high_water_mark, &self.pool).await
    }
}
