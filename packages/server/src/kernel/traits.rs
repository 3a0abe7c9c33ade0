// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// The poll-dedupe-publish cycle lives in domains/distribution and talks to the
// outside world exclusively through these traits.
//
// Naming convention: Base* for trait names (e.g., BasePublisher, BaseDeliveryLedger)

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domains::distribution::models::{DeliveryOutcome, DeliveryRecord, DestinationStats};
use crate::domains::distribution::Destination;
use crate::domains::job_posts::JobPostRow;

// =============================================================================
// Job Source Trait (read-only view of the job board)
// =============================================================================

#[async_trait]
pub trait BaseJobSource: Send + Sync {
    /// Published jobs with `created_at >= since`, ascending by `created_at`
    async fn fetch_candidates(&self, since: DateTime<Utc>) -> Result<Vec<JobPostRow>>;

    /// Jobs by id regardless of publish state, ascending by `created_at`
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<JobPostRow>>;

    /// Single job by id
    async fn get_job(&self, id: &str) -> Result<Option<JobPostRow>>;
}

// =============================================================================
// Delivery Ledger Trait (de-duplication record store)
// =============================================================================

#[async_trait]
pub trait BaseDeliveryLedger: Send + Sync {
    /// True iff a successful delivery exists for the pair
    async fn has_been_delivered(&self, job_id: &str, destination: Destination) -> Result<bool>;

    /// Number of failed attempts recorded for the pair
    async fn failed_attempts(&self, job_id: &str, destination: Destination) -> Result<u32>;

    /// Append a delivery record; never overwrites
    async fn record_delivery(
        &self,
        job_id: &str,
        destination: Destination,
        outcome: &DeliveryOutcome,
    ) -> Result<()>;

    /// Records from the last `window`, newest first
    async fn recently_delivered(&self, window: chrono::Duration, limit: i64)
        -> Result<Vec<DeliveryRecord>>;

    /// Jobs with failed, not yet exhausted, never delivered pairs attempted since `since`
    async fn retryable_job_ids(
        &self,
        since: DateTime<Utc>,
        destinations: &[Destination],
        max_failures: u32,
    ) -> Result<Vec<String>>;

    async fn deliveries_for_job(&self, job_id: &str) -> Result<Vec<DeliveryRecord>>;

    async fn stats(&self) -> Result<Vec<DestinationStats>>;

    /// Delete records older than `cutoff`, returning how many were removed
    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Cheap reachability check for health reporting
    async fn ping(&self) -> Result<()>;
}

// =============================================================================
// Cursor Store Trait (persisted high-water mark)
// =============================================================================

#[async_trait]
pub trait BaseCursorStore: Send + Sync {
    async fn load(&self) -> Result<Option<DateTime<Utc>>>;

    async fn save(&self, high_water_mark: DateTime<Utc>) -> Result<()>;
}

// =============================================================================
// Publisher Trait (one implementation per destination)
// =============================================================================

/// Rendered message handed to a publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub text: String,
    pub media_url: Option<String>,
}

/// What a destination returns for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

/// Publish failure classification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// Network failure, throttling or 5xx; the same request may succeed later
    #[error("transient destination error: {0}")]
    Transient(String),

    /// Bad credentials, unknown channel, rejected payload
    #[error("permanent destination error: {0}")]
    Permanent(String),

    /// No answer within the call budget; the message may or may not have been sent
    #[error("destination call timed out after {0:?}")]
    Timeout(Duration),
}

impl PublishError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::Transient(_))
    }
}

#[async_trait]
pub trait BasePublisher: Send + Sync {
    fn destination(&self) -> Destination;

    /// Send the message. Not idempotent: callers consult the ledger first.
    async fn publish(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, PublishError>;
}
