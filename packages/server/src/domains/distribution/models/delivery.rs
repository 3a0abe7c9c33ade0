use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::domains::distribution::Destination;

/// Result of one publish attempt, as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub destination_message_id: Option<String>,
    pub error_message: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(destination_message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            destination_message_id: Some(destination_message_id.into()),
            error_message: None,
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            destination_message_id: None,
            error_message: Some(error_message.into()),
        }
    }
}

/// One row of `job_deliveries`. Rows are appended, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeliveryRecord {
    pub id: i64,
    pub job_id: String,
    pub destination: String,
    pub delivered_at: DateTime<Utc>,
    pub destination_message_id: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Per-destination counters for the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DestinationStats {
    pub destination: String,
    pub delivered: i64,
    pub failed: i64,
    pub last_delivered_at: Option<DateTime<Utc>>,
}

impl DeliveryRecord {
    /// Append a delivery attempt.
    ///
    /// Returns `false` when a successful row for the pair already existed and
    /// this success was dropped by the partial unique index.
    pub async fn create(
        job_id: &str,
        destination: Destination,
        outcome: &DeliveryOutcome,
        pool: &PgPool,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO job_deliveries (job_id, destination, destination_message_id, success, error_message)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (job_id, destination) WHERE success DO NOTHING",
        )
        .bind(job_id)
        .bind(destination.as_str())
        .bind(&outcome.destination_message_id)
        .bind(outcome.success)
        .bind(&outcome.error_message)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn exists_successful(
        job_id: &str,
        destination: Destination,
        pool: &PgPool,
    ) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM job_deliveries
                 WHERE job_id = $1 AND destination = $2 AND success
             )",
        )
        .bind(job_id)
        .bind(destination.as_str())
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn count_failures(
        job_id: &str,
        destination: Destination,
        pool: &PgPool,
    ) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM job_deliveries
             WHERE job_id = $1 AND destination = $2 AND NOT success",
        )
        .bind(job_id)
        .bind(destination.as_str())
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Jobs with a failed attempt since `since` on one of `destinations`, no
    /// success on that destination, and fewer than `max_failures` failures.
    pub async fn find_retryable_job_ids(
        since: DateTime<Utc>,
        destinations: &[Destination],
        max_failures: i64,
        pool: &PgPool,
    ) -> Result<Vec<String>> {
        let destinations: Vec<&str> = destinations.iter().map(|d| d.as_str()).collect();
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT f.job_id
             FROM (
                 SELECT job_id, destination
                 FROM job_deliveries
                 WHERE NOT success AND destination = ANY($2)
                 GROUP BY job_id, destination
                 HAVING COUNT(*) < $3 AND MAX(delivered_at) >= $1
             ) f
             WHERE NOT EXISTS (
                 SELECT 1 FROM job_deliveries s
                 WHERE s.job_id = f.job_id AND s.destination = f.destination AND s.success
             )
             ORDER BY f.job_id",
        )
        .bind(since)
        .bind(&destinations)
        .bind(max_failures)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_recent(
        since: DateTime<Utc>,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM job_deliveries
             WHERE delivered_at >= $1
             ORDER BY delivered_at DESC, id DESC
             LIMIT $2",
        )
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_for_job(job_id: &str, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM job_deliveries
             WHERE job_id = $1
             ORDER BY delivered_at ASC, id ASC",
        )
        .bind(job_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn stats_by_destination(pool: &PgPool) -> Result<Vec<DestinationStats>> {
        sqlx::query_as::<_, DestinationStats>(
            "SELECT destination,
                    COUNT(*) FILTER (WHERE success) AS delivered,
                    COUNT(*) FILTER (WHERE NOT success) AS failed,
                    MAX(delivered_at) FILTER (WHERE success) AS last_delivered_at
             FROM job_deliveries
             GROUP BY destination
             ORDER BY destination",
        )
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Delete rows older than `cutoff`. Returns the number of rows removed.
    pub async fn delete_older_than(cutoff: DateTime<Utc>, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM job_deliveries WHERE delivered_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
