//! Postgres-backed source, ledger and cursor tests.
//!
//! Run with: cargo test --test ledger_tests -- --ignored

mod common;

use chrono::{DateTime, SubsecRound, Utc};
use crate::common::{insert_job_post, job_row, unpublished_row, TestHarness};
use relay_core::domains::distribution::models::DeliveryOutcome;
use relay_core::domains::distribution::Destination;
use relay_core::kernel::{
    BaseCursorStore, BaseDeliveryLedger, BaseJobSource, PgCursorStore, PgDeliveryLedger,
    PgJobSource,
};
use test_context::test_context;

/// Job ids are unique per test because all tests share one database.
fn unique_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

/// `createdAt` is stored with millisecond precision.
fn minutes_before_now(minutes: i64) -> DateTime<Utc> {
    (Utc::now() - chrono::Duration::minutes(minutes)).trunc_subsecs(3)
}

// =============================================================================
// Job source
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn candidates_exclude_unpublished_and_old_rows(ctx: &TestHarness) {
    let fresh = unique_id("job_fresh");
    let draft = unique_id("job_draft");
    let old = unique_id("job_old");
    let mut row = job_row(&fresh, "Data Analyst", minutes_before_now(5));
    row.category = Some("Data".to_string());
    insert_job_post(&ctx.db_pool, &row).await.unwrap();
    insert_job_post(&ctx.db_pool, &unpublished_row(&draft, "Draft", minutes_before_now(5)))
        .await
        .unwrap();
    insert_job_post(&ctx.db_pool, &job_row(&old, "Old", minutes_before_now(600)))
        .await
        .unwrap();

    let source = PgJobSource::new(ctx.db_pool.clone());
    let rows = source.fetch_candidates(minutes_before_now(60)).await.unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();

    assert!(ids.contains(&fresh.as_str()));
    assert!(!ids.contains(&draft.as_str()));
    assert!(!ids.contains(&old.as_str()));

    let found = rows.iter().find(|r| r.id == fresh).unwrap();
    assert_eq!(found.category.as_deref(), Some("Data"));
    assert_eq!(found.created_at, row.created_at);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn lookup_by_id_returns_unpublished_rows(ctx: &TestHarness) {
    let draft = unique_id("job_draft");
    insert_job_post(&ctx.db_pool, &unpublished_row(&draft, "Draft", minutes_before_now(1)))
        .await
        .unwrap();

    let source = PgJobSource::new(ctx.db_pool.clone());

    let row = source.get_job(&draft).await.unwrap().expect("row exists");
    assert!(!row.is_published);
    assert!(source.get_job("job_does_not_exist").await.unwrap().is_none());

    let rows = source.fetch_by_ids(&[draft.clone()]).await.unwrap();
    assert_eq!(rows.len(), 1);
}

// =============================================================================
// Delivery ledger
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn only_one_success_is_kept_per_pair(ctx: &TestHarness) {
    let job = unique_id("job_dup");
    let ledger = PgDeliveryLedger::new(ctx.db_pool.clone());

    assert!(!ledger.has_been_delivered(&job, Destination::Telegram).await.unwrap());

    ledger
        .record_delivery(&job, Destination::Telegram, &DeliveryOutcome::delivered("101"))
        .await
        .unwrap();
    ledger
        .record_delivery(&job, Destination::Telegram, &DeliveryOutcome::delivered("102"))
        .await
        .unwrap();

    assert!(ledger.has_been_delivered(&job, Destination::Telegram).await.unwrap());
    assert!(!ledger.has_been_delivered(&job, Destination::WhatsApp).await.unwrap());

    let records = ledger.deliveries_for_job(&job).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].destination_message_id.as_deref(), Some("101"));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn failures_are_appended_and_counted(ctx: &TestHarness) {
    let job = unique_id("job_fail");
    let ledger = PgDeliveryLedger::new(ctx.db_pool.clone());

    for attempt in 0..2 {
        ledger
            .record_delivery(
                &job,
                Destination::Facebook,
                &DeliveryOutcome::failed(format!("rate limited {}", attempt)),
            )
            .await
            .unwrap();
    }

    assert_eq!(ledger.failed_attempts(&job, Destination::Facebook).await.unwrap(), 2);
    assert_eq!(ledger.failed_attempts(&job, Destination::Telegram).await.unwrap(), 0);
    assert!(!ledger.has_been_delivered(&job, Destination::Facebook).await.unwrap());
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn retryable_ids_honor_successes_and_failure_cap(ctx: &TestHarness) {
    let pending = unique_id("job_pending");
    let recovered = unique_id("job_recovered");
    let exhausted = unique_id("job_exhausted");
    let ledger = PgDeliveryLedger::new(ctx.db_pool.clone());
    let since = Utc::now() - chrono::Duration::hours(1);

    ledger
        .record_delivery(&pending, Destination::WhatsApp, &DeliveryOutcome::failed("timeout"))
        .await
        .unwrap();

    ledger
        .record_delivery(&recovered, Destination::WhatsApp, &DeliveryOutcome::failed("timeout"))
        .await
        .unwrap();
    ledger
        .record_delivery(&recovered, Destination::WhatsApp, &DeliveryOutcome::delivered("SM1"))
        .await
        .unwrap();

    for _ in 0..3 {
        ledger
            .record_delivery(&exhausted, Destination::WhatsApp, &DeliveryOutcome::failed("invalid"))
            .await
            .unwrap();
    }

    let ids = ledger
        .retryable_job_ids(since, &Destination::ALL, 3)
        .await
        .unwrap();
    assert!(ids.contains(&pending));
    assert!(!ids.contains(&recovered));
    assert!(!ids.contains(&exhausted));

    // A destination that is no longer configured is not retried
    let ids = ledger
        .retryable_job_ids(since, &[Destination::Telegram], 3)
        .await
        .unwrap();
    assert!(!ids.contains(&pending));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn recent_deliveries_are_newest_first(ctx: &TestHarness) {
    let first = unique_id("job_first");
    let second = unique_id("job_second");
    let ledger = PgDeliveryLedger::new(ctx.db_pool.clone());

    ledger
        .record_delivery(&first, Destination::Telegram, &DeliveryOutcome::delivered("1"))
        .await
        .unwrap();
    ledger
        .record_delivery(&second, Destination::Telegram, &DeliveryOutcome::delivered("2"))
        .await
        .unwrap();

    let recent = ledger
        .recently_delivered(chrono::Duration::hours(1), 500)
        .await
        .unwrap();
    let first_pos = recent.iter().position(|r| r.job_id == first).unwrap();
    let second_pos = recent.iter().position(|r| r.job_id == second).unwrap();
    assert!(second_pos < first_pos);

    let limited = ledger
        .recently_delivered(chrono::Duration::hours(1), 1)
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn stats_count_successes_and_failures(ctx: &TestHarness) {
    let ledger = PgDeliveryLedger::new(ctx.db_pool.clone());
    let before = ledger.stats().await.unwrap();
    let count = |stats: &[relay_core::domains::distribution::models::DestinationStats]| {
        stats
            .iter()
            .find(|s| s.destination == "facebook")
            .map(|s| (s.delivered, s.failed))
            .unwrap_or((0, 0))
    };

    let job = unique_id("job_stats");
    ledger
        .record_delivery(&job, Destination::Facebook, &DeliveryOutcome::failed("bad token"))
        .await
        .unwrap();
    ledger
        .record_delivery(&job, Destination::Facebook, &DeliveryOutcome::delivered("123_456"))
        .await
        .unwrap();

    let after = ledger.stats().await.unwrap();
    let (delivered_before, failed_before) = count(&before);
    let (delivered_after, failed_after) = count(&after);
    assert!(delivered_after > delivered_before);
    assert!(failed_after > failed_before);
    let facebook = after.iter().find(|s| s.destination == "facebook").unwrap();
    assert!(facebook.last_delivered_at.is_some());
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn prune_removes_only_old_rows(ctx: &TestHarness) {
    let old = unique_id("job_ancient");
    let recent = unique_id("job_recent");
    let ledger = PgDeliveryLedger::new(ctx.db_pool.clone());

    sqlx::query(
        "INSERT INTO job_deliveries (job_id, destination, delivered_at, destination_message_id, success)
         VALUES ($1, 'telegram', NOW() - INTERVAL '200 days', '1', true)",
    )
    .bind(&old)
    .execute(&ctx.db_pool)
    .await
    .unwrap();
    ledger
        .record_delivery(&recent, Destination::Telegram, &DeliveryOutcome::delivered("2"))
        .await
        .unwrap();

    let removed = ledger
        .prune(Utc::now() - chrono::Duration::days(90))
        .await
        .unwrap();

    assert!(removed >= 1);
    assert!(ledger.deliveries_for_job(&old).await.unwrap().is_empty());
    assert_eq!(ledger.deliveries_for_job(&recent).await.unwrap().len(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn ledger_ping_succeeds(ctx: &TestHarness) {
    let ledger = PgDeliveryLedger::new(ctx.db_pool.clone());
    ledger.ping().await.unwrap();
}

// =============================================================================
// Cursor
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn cursor_never_moves_backwards(ctx: &TestHarness) {
    let cursor = PgCursorStore::new(ctx.db_pool.clone());
    let newer = minutes_before_now(1);
    let older = minutes_before_now(30);

    cursor.save(newer).await.unwrap();
    cursor.save(older).await.unwrap();

    assert_eq!(cursor.load().await.unwrap(), Some(newer));
}
