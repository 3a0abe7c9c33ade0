// TestDependencies - in-memory implementations for testing
//
// Provides doubles for every relay seam so cycles can run without Postgres or
// network access.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{
    BaseCursorStore, BaseDeliveryLedger, BaseJobSource, BasePublisher, DeliveryReceipt,
    OutboundMessage, PublishError, RelayDeps,
};
use crate::domains::distribution::models::{DeliveryOutcome, DeliveryRecord, DestinationStats};
use crate::domains::distribution::{CycleRunner, CycleSettings, Destination, MessageFormatter};
use crate::domains::job_posts::JobPostRow;

/// A panicking test must not cascade into every later lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Mock Job Source
// =============================================================================

#[derive(Default)]
pub struct MockJobSource {
    rows: Mutex<Vec<JobPostRow>>,
    failing: AtomicBool,
    hanging: AtomicBool,
    fetch_calls: Mutex<Vec<DateTime<Utc>>>,
}

impl MockJobSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, rows: Vec<JobPostRow>) -> Self {
        lock(&self.rows).extend(rows);
        self
    }

    pub fn push_row(&self, row: JobPostRow) {
        lock(&self.rows).push(row);
    }

    /// Make every call fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every call wait forever until reset
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    /// `since` argument of every `fetch_candidates` call
    pub fn fetch_calls(&self) -> Vec<DateTime<Utc>> {
        lock(&self.fetch_calls).clone()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("job source unreachable"));
        }
        Ok(())
    }

    async fn stall(&self) {
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    fn sorted(mut rows: Vec<JobPostRow>) -> Vec<JobPostRow> {
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        rows
    }
}

#[async_trait]
impl BaseJobSource for MockJobSource {
    async fn fetch_candidates(&self, since: DateTime<Utc>) -> Result<Vec<JobPostRow>> {
        lock(&self.fetch_calls).push(since);
        self.stall().await;
        self.check()?;
        let rows = lock(&self.rows)
            .iter()
            .filter(|r| r.is_published && r.created_at >= since)
            .cloned()
            .collect();
        Ok(Self::sorted(rows))
    }

    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<JobPostRow>> {
        self.stall().await;
        self.check()?;
        let rows = lock(&self.rows)
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect();
        Ok(Self::sorted(rows))
    }

    async fn get_job(&self, id: &str) -> Result<Option<JobPostRow>> {
        self.stall().await;
        self.check()?;
        Ok(lock(&self.rows).iter().find(|r| r.id == id).cloned())
    }
}

// =============================================================================
// In-Memory Delivery Ledger
// =============================================================================

/// Ledger with the same semantics as the `job_deliveries` table, including
/// at most one successful row per pair.
#[derive(Default)]
pub struct InMemoryLedger {
    records: Mutex<Vec<DeliveryRecord>>,
    unreachable: AtomicBool,
    hanging: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store being down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Simulate a stuck query: pair lookups and writes never return
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    async fn stall(&self) {
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    pub fn records(&self) -> Vec<DeliveryRecord> {
        lock(&self.records).clone()
    }

    pub fn records_for(&self, job_id: &str, destination: Destination) -> Vec<DeliveryRecord> {
        lock(&self.records)
            .iter()
            .filter(|r| r.job_id == job_id && r.destination == destination.as_str())
            .cloned()
            .collect()
    }

    /// Seed a record with an explicit timestamp
    pub fn seed(
        &self,
        job_id: &str,
        destination: Destination,
        outcome: DeliveryOutcome,
        delivered_at: DateTime<Utc>,
    ) {
        self.push(job_id, destination, &outcome, delivered_at);
    }

    fn push(
        &self,
        job_id: &str,
        destination: Destination,
        outcome: &DeliveryOutcome,
        delivered_at: DateTime<Utc>,
    ) -> bool {
        let mut records = lock(&self.records);
        if outcome.success
            && records.iter().any(|r| {
                r.success && r.job_id == job_id && r.destination == destination.as_str()
            })
        {
            return false;
        }
        let id = records.len() as i64 + 1;
        records.push(DeliveryRecord {
            id,
            job_id: job_id.to_string(),
            destination: destination.as_str().to_string(),
            delivered_at,
            destination_message_id: outcome.destination_message_id.clone(),
            success: outcome.success,
            error_message: outcome.error_message.clone(),
        });
        true
    }

    fn check(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(anyhow!("ledger unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl BaseDeliveryLedger for InMemoryLedger {
    async fn has_been_delivered(&self, job_id: &str, destination: Destination) -> Result<bool> {
        self.stall().await;
        self.check()?;
        Ok(lock(&self.records)
            .iter()
            .any(|r| r.success && r.job_id == job_id && r.destination == destination.as_str()))
    }

    async fn failed_attempts(&self, job_id: &str, destination: Destination) -> Result<u32> {
        self.stall().await;
        self.check()?;
        Ok(lock(&self.records)
            .iter()
            .filter(|r| !r.success && r.job_id == job_id && r.destination == destination.as_str())
            .count() as u32)
    }

    async fn record_delivery(
        &self,
        job_id: &str,
        destination: Destination,
        outcome: &DeliveryOutcome,
    ) -> Result<()> {
        self.stall().await;
        self.check()?;
        self.push(job_id, destination, outcome, Utc::now());
        Ok(())
    }

    async fn recently_delivered(
        &self,
        window: chrono::Duration,
        limit: i64,
    ) -> Result<Vec<DeliveryRecord>> {
        self.check()?;
        let since = Utc::now() - window;
        let mut recent: Vec<DeliveryRecord> = lock(&self.records)
            .iter()
            .filter(|r| r.delivered_at >= since)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.delivered_at.cmp(&a.delivered_at).then(b.id.cmp(&a.id)));
        recent.truncate(limit.max(0) as usize);
        Ok(recent)
    }

    async fn retryable_job_ids(
        &self,
        since: DateTime<Utc>,
        destinations: &[Destination],
        max_failures: u32,
    ) -> Result<Vec<String>> {
        self.stall().await;
        self.check()?;
        let records = lock(&self.records);
        let delivered: HashSet<(&str, &str)> = records
            .iter()
            .filter(|r| r.success)
            .map(|r| (r.job_id.as_str(), r.destination.as_str()))
            .collect();

        let mut failures: BTreeMap<(&str, &str), (u32, DateTime<Utc>)> = BTreeMap::new();
        for r in records.iter().filter(|r| !r.success) {
            let entry = failures
                .entry((r.job_id.as_str(), r.destination.as_str()))
                .or_insert((0, r.delivered_at));
            entry.0 += 1;
            entry.1 = entry.1.max(r.delivered_at);
        }

        let wanted: Vec<&str> = destinations.iter().map(|d| d.as_str()).collect();
        let mut ids: Vec<String> = failures
            .into_iter()
            .filter(|((job, dest), (count, last))| {
                wanted.contains(dest)
                    && *count < max_failures
                    && *last >= since
                    && !delivered.contains(&(*job, *dest))
            })
            .map(|((job, _), _)| job.to_string())
            .collect();
        ids.dedup();
        Ok(ids)
    }

    async fn deliveries_for_job(&self, job_id: &str) -> Result<Vec<DeliveryRecord>> {
        self.check()?;
        Ok(lock(&self.records)
            .iter()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<Vec<DestinationStats>> {
        self.check()?;
        let mut by_destination: BTreeMap<String, DestinationStats> = BTreeMap::new();
        for r in lock(&self.records).iter() {
            let stats = by_destination
                .entry(r.destination.clone())
                .or_insert_with(|| DestinationStats {
                    destination: r.destination.clone(),
                    delivered: 0,
                    failed: 0,
                    last_delivered_at: None,
                });
            if r.success {
                stats.delivered += 1;
                stats.last_delivered_at = stats.last_delivered_at.max(Some(r.delivered_at));
            } else {
                stats.failed += 1;
            }
        }
        Ok(by_destination.into_values().collect())
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.check()?;
        let mut records = lock(&self.records);
        let before = records.len();
        records.retain(|r| r.delivered_at >= cutoff);
        Ok((before - records.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        self.check()
    }
}

// =============================================================================
// In-Memory Cursor Store
// =============================================================================

#[derive(Default)]
pub struct InMemoryCursorStore {
    mark: Mutex<Option<DateTime<Utc>>>,
    saves: AtomicUsize,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mark(self, mark: DateTime<Utc>) -> Self {
        *lock(&self.mark) = Some(mark);
        self
    }

    pub fn mark(&self) -> Option<DateTime<Utc>> {
        *lock(&self.mark)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseCursorStore for InMemoryCursorStore {
    async fn load(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(*lock(&self.mark))
    }

    async fn save(&self, high_water_mark: DateTime<Utc>) -> Result<()> {
        let mut mark = lock(&self.mark);
        *mark = (*mark).max(Some(high_water_mark));
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Mock Publisher
// =============================================================================

/// Publisher that records every message and replays scripted failures.
///
/// Scripted responses are consumed in order; once exhausted every call
/// succeeds with a message id of `{destination}-{n}`. Rules registered with
/// [`MockPublisher::fail_when_contains`] apply to every matching message.
pub struct MockPublisher {
    destination: Destination,
    scripted: Mutex<VecDeque<PublishError>>,
    rules: Mutex<Vec<(String, PublishError)>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<OutboundMessage>>,
    sent: AtomicUsize,
}

impl MockPublisher {
    pub fn new(destination: Destination) -> Self {
        Self {
            destination,
            scripted: Mutex::new(VecDeque::new()),
            rules: Mutex::new(Vec::new()),
            delay: None,
            calls: Mutex::new(Vec::new()),
            sent: AtomicUsize::new(0),
        }
    }

    /// Fail the next unscripted call with `error`
    pub fn with_error(self, error: PublishError) -> Self {
        lock(&self.scripted).push_back(error);
        self
    }

    /// Sleep before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every message whose text contains `needle`
    pub fn fail_when_contains(&self, needle: &str, error: PublishError) {
        lock(&self.rules).push((needle.to_string(), error));
    }

    pub fn clear_rules(&self) {
        lock(&self.rules).clear();
    }

    pub fn calls(&self) -> Vec<OutboundMessage> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Whether any message text contains `needle`
    pub fn was_sent(&self, needle: &str) -> bool {
        lock(&self.calls).iter().any(|m| m.text.contains(needle))
    }
}

#[async_trait]
impl BasePublisher for MockPublisher {
    fn destination(&self) -> Destination {
        self.destination
    }

    async fn publish(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, PublishError> {
        lock(&self.calls).push(message.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let rule = lock(&self.rules)
            .iter()
            .find(|(needle, _)| message.text.contains(needle.as_str()))
            .map(|(_, error)| error.clone());
        if let Some(error) = rule {
            return Err(error);
        }

        if let Some(error) = lock(&self.scripted).pop_front() {
            return Err(error);
        }

        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(DeliveryReceipt {
            message_id: format!("{}-{}", self.destination, n),
        })
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Doubles for every seam plus a publisher per destination.
pub struct TestDependencies {
    pub source: Arc<MockJobSource>,
    pub ledger: Arc<InMemoryLedger>,
    pub cursor: Arc<InMemoryCursorStore>,
    pub publishers: Vec<Arc<MockPublisher>>,
    pub formatter: MessageFormatter,
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            source: Arc::new(MockJobSource::new()),
            ledger: Arc::new(InMemoryLedger::new()),
            cursor: Arc::new(InMemoryCursorStore::new()),
            publishers: Destination::ALL
                .iter()
                .map(|d| Arc::new(MockPublisher::new(*d)))
                .collect(),
            formatter: MessageFormatter::new(Some("https://jobs.example.com".into()), None),
        }
    }

    pub fn mock_source(mut self, source: MockJobSource) -> Self {
        self.source = Arc::new(source);
        self
    }

    pub fn mock_cursor(mut self, cursor: InMemoryCursorStore) -> Self {
        self.cursor = Arc::new(cursor);
        self
    }

    /// Replace the publisher set
    pub fn mock_publishers(mut self, publishers: Vec<MockPublisher>) -> Self {
        self.publishers = publishers.into_iter().map(Arc::new).collect();
        self
    }

    pub fn publisher(&self, destination: Destination) -> Option<Arc<MockPublisher>> {
        self.publishers
            .iter()
            .find(|p| p.destination == destination)
            .cloned()
    }

    pub fn relay_deps(&self) -> RelayDeps {
        RelayDeps::new(
            self.source.clone(),
            self.ledger.clone(),
            self.cursor.clone(),
            self.publishers
                .iter()
                .map(|p| p.clone() as Arc<dyn BasePublisher>)
                .collect(),
            self.formatter.clone(),
        )
    }

    pub fn runner(&self, settings: CycleSettings) -> Arc<CycleRunner> {
        Arc::new(CycleRunner::new(self.relay_deps(), settings))
    }
}
