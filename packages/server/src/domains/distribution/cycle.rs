//! One poll-dedupe-publish pass over recent job postings.
//!
//! ```text
//! fetch_candidates(since) ─┐
//!                          ├─► merge by id ─► validate ─► per destination:
//! retryable_job_ids ───────┘                               ledger check
//!   └─► fetch_by_ids                                       format
//!                                                          publish_with_retry
//!                                                          record_delivery
//! ```
//!
//! Jobs are processed oldest first, one at a time. The destinations of a single
//! job are published concurrently.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::retry::{publish_with_retry, RetryPolicy};
use super::Destination;
use crate::domains::distribution::models::DeliveryOutcome;
use crate::domains::job_posts::{JobPostRow, JobRecord, ValidationError};
use crate::kernel::{BasePublisher, OutboundMessage, RelayDeps};

#[derive(Debug, Clone, Copy)]
pub struct CycleSettings {
    /// How far back a job stays eligible
    pub lookback: chrono::Duration,
    /// Failed records after which a pair is no longer attempted
    pub max_delivery_failures: u32,
    pub retry: RetryPolicy,
    /// Upper bound on every job source, ledger and cursor call
    pub store_timeout: Duration,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            lookback: chrono::Duration::hours(24),
            max_delivery_failures: 3,
            retry: RetryPolicy::default(),
            store_timeout: Duration::from_secs(10),
        }
    }
}

/// State carried from one cycle to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    pub high_water_mark: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleTrigger {
    Scheduled,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairStatus {
    Published,
    Failed,
    SkippedDuplicate,
    SkippedUnverified,
    SkippedExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationOutcome {
    pub destination: Destination,
    pub status: PairStatus,
    pub destination_message_id: Option<String>,
    pub error: Option<String>,
}

impl DestinationOutcome {
    fn skipped(destination: Destination, status: PairStatus) -> Self {
        Self {
            destination,
            status,
            destination_message_id: None,
            error: None,
        }
    }
}

/// Everything that happened to one job in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set when the job failed validation and was not attempted
    pub error: Option<String>,
    pub destinations: Vec<DestinationOutcome>,
}

impl JobOutcome {
    pub fn has_status(&self, status: PairStatus) -> bool {
        self.destinations.iter().any(|d| d.status == status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub trigger: CycleTrigger,
    pub status: CycleStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub since: Option<DateTime<Utc>>,
    pub high_water_mark: Option<DateTime<Utc>>,
    pub candidates: usize,
    pub skipped_duplicate: usize,
    pub skipped_unverified: usize,
    pub skipped_exhausted: usize,
    pub invalid: usize,
    pub published: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub outcomes: Vec<JobOutcome>,
}

impl CycleSummary {
    pub fn new(trigger: CycleTrigger, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            trigger,
            status: CycleStatus::Completed,
            started_at,
            finished_at: None,
            since: None,
            high_water_mark: None,
            candidates: 0,
            skipped_duplicate: 0,
            skipped_unverified: 0,
            skipped_exhausted: 0,
            invalid: 0,
            published: 0,
            failed: 0,
            errors: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    /// Summary for a cycle that died before producing one.
    pub fn failed(trigger: CycleTrigger, started_at: DateTime<Utc>, error: String) -> Self {
        let mut summary = Self::new(trigger, started_at);
        summary.status = CycleStatus::Failed;
        summary.finished_at = Some(Utc::now());
        summary.errors.push(error);
        summary
    }

    fn tally(&mut self, outcome: JobOutcome) {
        if let Some(error) = &outcome.error {
            self.invalid += 1;
            self.errors.push(error.clone());
        }
        for pair in &outcome.destinations {
            match pair.status {
                PairStatus::Published => self.published += 1,
                PairStatus::Failed => self.failed += 1,
                PairStatus::SkippedDuplicate => self.skipped_duplicate += 1,
                PairStatus::SkippedUnverified => self.skipped_unverified += 1,
                PairStatus::SkippedExhausted => self.skipped_exhausted += 1,
            }
            if let Some(error) = &pair.error {
                self.errors.push(format!(
                    "job {} on {}: {}",
                    outcome.job_id, pair.destination, error
                ));
            }
        }
        self.outcomes.push(outcome);
    }
}

/// Why a single job could not be force-published.
#[derive(Debug, Error)]
pub enum PublishJobError {
    #[error("job {0} not found")]
    NotFound(String),

    #[error("job {0} is not published")]
    Unpublished(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("job source unavailable: {0}")]
    Source(anyhow::Error),
}

pub struct CycleRunner {
    deps: RelayDeps,
    settings: CycleSettings,
}

impl CycleRunner {
    pub fn new(deps: RelayDeps, settings: CycleSettings) -> Self {
        Self { deps, settings }
    }

    pub fn deps(&self) -> &RelayDeps {
        &self.deps
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        with_store_timeout(self.settings.store_timeout, operation, call).await
    }

    /// Run one cycle. Never fails: faults end up in the summary.
    pub async fn run_cycle(
        &self,
        state: CycleState,
        trigger: CycleTrigger,
        now: DateTime<Utc>,
    ) -> (CycleState, CycleSummary) {
        let mut summary = CycleSummary::new(trigger, now);
        tracing::info!(
            cycle_id = %summary.cycle_id,
            trigger = ?trigger,
            high_water_mark = ?state.high_water_mark,
            "Starting distribution cycle"
        );

        let next_state = match self.try_run_cycle(state, now, &mut summary).await {
            Ok(next) => next,
            Err(e) => {
                tracing::error!(cycle_id = %summary.cycle_id, error = %e, "Distribution cycle failed");
                summary.status = CycleStatus::Failed;
                summary.errors.push(format!("{:#}", e));
                state
            }
        };

        summary.high_water_mark = next_state.high_water_mark;
        summary.finished_at = Some(Utc::now());

        tracing::info!(
            cycle_id = %summary.cycle_id,
            status = ?summary.status,
            candidates = summary.candidates,
            published = summary.published,
            failed = summary.failed,
            skipped_duplicate = summary.skipped_duplicate,
            skipped_unverified = summary.skipped_unverified,
            skipped_exhausted = summary.skipped_exhausted,
            invalid = summary.invalid,
            "Distribution cycle finished"
        );

        (next_state, summary)
    }

    async fn try_run_cycle(
        &self,
        state: CycleState,
        now: DateTime<Utc>,
        summary: &mut CycleSummary,
    ) -> Result<CycleState> {
        let window_start = now - self.settings.lookback;
        let since = match state.high_water_mark {
            Some(hwm) if hwm > window_start => hwm,
            _ => window_start,
        };
        summary.since = Some(since);

        let rows = self.collect_candidates(state, window_start, since, summary).await?;
        summary.candidates = rows.len();

        let mut newest_seen = state.high_water_mark;
        let mut earliest_unverified: Option<DateTime<Utc>> = None;

        for row in rows {
            let created_at = row.created_at;
            newest_seen = newest_seen.max(Some(created_at));

            let (job_id, title) = (row.id.clone(), row.title.clone());
            let outcome = match JobRecord::try_from(row) {
                Ok(job) => self.process_job(&job).await,
                Err(e) => {
                    tracing::warn!(%job_id, error = %e, "Skipping invalid job");
                    JobOutcome {
                        job_id,
                        title: Some(title),
                        created_at,
                        error: Some(e.to_string()),
                        destinations: Vec::new(),
                    }
                }
            };

            // Rows arrive oldest first, so the first unverified row is the earliest
            if outcome.has_status(PairStatus::SkippedUnverified) {
                earliest_unverified.get_or_insert(created_at);
            }
            summary.tally(outcome);
        }

        Ok(CycleState {
            high_water_mark: next_high_water_mark(
                state.high_water_mark,
                newest_seen,
                earliest_unverified,
            ),
        })
    }

    /// New rows since the cursor plus earlier rows with retryable failures.
    async fn collect_candidates(
        &self,
        state: CycleState,
        window_start: DateTime<Utc>,
        since: DateTime<Utc>,
        summary: &mut CycleSummary,
    ) -> Result<Vec<JobPostRow>> {
        let fresh = self.bounded("fetch_candidates", self.deps.source.fetch_candidates(since)).await?;

        let mut merged: BTreeMap<String, JobPostRow> = fresh
            .into_iter()
            .filter(|row| row.is_published)
            .filter(|row| state.high_water_mark.map_or(true, |hwm| row.created_at > hwm))
            .map(|row| (row.id.clone(), row))
            .collect();

        let destinations = self.deps.destinations();
        let retryable = self.deps.ledger.retryable_job_ids(
            window_start,
            &destinations,
            self.settings.max_delivery_failures,
        );
        match self.bounded("retryable_job_ids", retryable).await {
            Ok(ids) if !ids.is_empty() => {
                let retries = self
                    .bounded("fetch_by_ids", self.deps.source.fetch_by_ids(&ids))
                    .await?;
                for row in retries {
                    if row.is_published && row.created_at >= window_start {
                        merged.entry(row.id.clone()).or_insert(row);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Could not load retryable jobs; retrying next cycle");
                summary
                    .errors
                    .push(format!("retry lookup failed: {:#}", e));
            }
        }

        let mut rows: Vec<JobPostRow> = merged.into_values().collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    /// Publish one validated job to every configured destination it has not reached.
    pub async fn process_job(&self, job: &JobRecord) -> JobOutcome {
        let attempts = self
            .deps
            .publishers
            .iter()
            .map(|publisher| self.process_pair(job, publisher.as_ref()));
        let destinations = join_all(attempts).await;

        JobOutcome {
            job_id: job.id.clone(),
            title: Some(job.title.clone()),
            created_at: job.created_at,
            error: None,
            destinations,
        }
    }

    async fn process_pair(&self, job: &JobRecord, publisher: &dyn BasePublisher) -> DestinationOutcome {
        let destination = publisher.destination();
        let ledger = &self.deps.ledger;

        match self
            .bounded("has_been_delivered", ledger.has_been_delivered(&job.id, destination))
            .await
        {
            Ok(true) => {
                tracing::debug!(job_id = %job.id, %destination, "Already delivered");
                return DestinationOutcome::skipped(destination, PairStatus::SkippedDuplicate);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(job_id = %job.id, %destination, error = %e, "Ledger unavailable, skipping pair");
                return DestinationOutcome::skipped(destination, PairStatus::SkippedUnverified);
            }
        }

        match self
            .bounded("failed_attempts", ledger.failed_attempts(&job.id, destination))
            .await
        {
            Ok(failures) if failures >= self.settings.max_delivery_failures => {
                tracing::debug!(job_id = %job.id, %destination, failures, "Retries exhausted");
                return DestinationOutcome::skipped(destination, PairStatus::SkippedExhausted);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(job_id = %job.id, %destination, error = %e, "Ledger unavailable, skipping pair");
                return DestinationOutcome::skipped(destination, PairStatus::SkippedUnverified);
            }
        }

        let message = OutboundMessage {
            text: self.deps.formatter.format(job, destination),
            media_url: self.deps.formatter.media_url(job),
        };

        let (mut outcome, record) =
            match publish_with_retry(publisher, &message, &self.settings.retry).await {
                Ok(receipt) => {
                    tracing::info!(
                        job_id = %job.id,
                        %destination,
                        message_id = %receipt.message_id,
                        "Job published"
                    );
                    (
                        DestinationOutcome {
                            destination,
                            status: PairStatus::Published,
                            destination_message_id: Some(receipt.message_id.clone()),
                            error: None,
                        },
                        DeliveryOutcome::delivered(receipt.message_id),
                    )
                }
                Err(e) => {
                    tracing::error!(job_id = %job.id, %destination, error = %e, "Job publish failed");
                    (
                        DestinationOutcome {
                            destination,
                            status: PairStatus::Failed,
                            destination_message_id: None,
                            error: Some(e.to_string()),
                        },
                        DeliveryOutcome::failed(e.to_string()),
                    )
                }
            };

        if let Err(e) = self
            .bounded(
                "record_delivery",
                ledger.record_delivery(&job.id, destination, &record),
            )
            .await
        {
            tracing::error!(
                job_id = %job.id,
                %destination,
                error = %e,
                "Failed to record delivery"
            );
            let note = format!("delivery not recorded: {:#}", e);
            outcome.error = Some(match outcome.error.take() {
                Some(existing) => format!("{}; {}", existing, note),
                None => note,
            });
        }

        outcome
    }

    /// Force-publish one job by id. The ledger still decides which destinations get it.
    pub async fn publish_job(&self, job_id: &str) -> Result<JobOutcome, PublishJobError> {
        let row = self
            .bounded("get_job", self.deps.source.get_job(job_id))
            .await
            .map_err(PublishJobError::Source)?
            .ok_or_else(|| PublishJobError::NotFound(job_id.to_string()))?;

        if !row.is_published {
            return Err(PublishJobError::Unpublished(job_id.to_string()));
        }

        let job = JobRecord::try_from(row)?;
        tracing::info!(job_id = %job.id, "Force-publishing job");
        Ok(self.process_job(&job).await)
    }
}

/// Await a store call, failing it once `limit` elapses.
pub(crate) async fn with_store_timeout<T>(
    limit: Duration,
    operation: &'static str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("{} timed out after {:?}", operation, limit)),
    }
}

/// Advance the mark to the newest row seen, but keep it below any row whose
/// pairs could not be checked against the ledger so that row is fetched again.
/// Never moves backwards.
fn next_high_water_mark(
    previous: Option<DateTime<Utc>>,
    newest_seen: Option<DateTime<Utc>>,
    earliest_unverified: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let candidate = match earliest_unverified {
        Some(held) => {
            let ceiling = held - chrono::Duration::milliseconds(1);
            newest_seen.map(|seen| seen.min(ceiling))
        }
        None => newest_seen,
    };
    previous.max(candidate)
}
