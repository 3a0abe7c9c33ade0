//! HTTP API tests against in-memory doubles.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use crate::common::{job_row, unpublished_row};
use relay_core::domains::distribution::{CycleCoordinator, CycleSettings, Destination, RetryPolicy};
use relay_core::kernel::test_dependencies::{MockJobSource, MockPublisher};
use relay_core::kernel::TestDependencies;
use relay_core::server::{build_app, AppState};
use serde_json::Value;
use tower::ServiceExt;

fn settings() -> CycleSettings {
    CycleSettings {
        retry: RetryPolicy {
            request_timeout: Duration::from_secs(2),
            max_attempts: 1,
            initial_backoff: Duration::from_millis(1),
        },
        ..CycleSettings::default()
    }
}

fn deps() -> TestDependencies {
    let created = Utc::now() - chrono::Duration::minutes(10);
    TestDependencies::new().mock_source(MockJobSource::new().with_rows(vec![
        job_row("job_1", "Data Analyst", created),
        unpublished_row("job_draft", "Draft Role", created),
    ]))
}

fn app(deps: &TestDependencies) -> (Router, Arc<CycleCoordinator>) {
    let coordinator = Arc::new(CycleCoordinator::new(
        deps.runner(settings()),
        Duration::from_secs(60),
    ));
    (build_app(AppState::new(coordinator.clone())), coordinator)
}

async fn send(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

// =============================================================================
// Service info and health
// =============================================================================

#[tokio::test]
async fn root_lists_configured_destinations() {
    let deps = deps();
    let (app, _) = app(&deps);

    let (status, body) = send(&app, Method::GET, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "job-relay");
    assert_eq!(
        body["destinations"],
        serde_json::json!(["telegram", "whatsapp", "facebook"])
    );
}

#[tokio::test]
async fn health_reports_ledger_state() {
    let deps = deps();
    let (app, _) = app(&deps);

    let (status, body) = send(&app, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ledger"]["status"], "ok");

    deps.ledger.set_unreachable(true);
    let (status, body) = send(&app, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

// =============================================================================
// Candidates and jobs
// =============================================================================

#[tokio::test]
async fn candidates_exclude_delivered_and_unpublished_jobs() {
    let deps = deps();
    let (app, _) = app(&deps);

    let (status, body) = send(&app, Method::GET, "/api/candidates?hours=24").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["candidates"][0]["job"]["id"], "job_1");
    assert_eq!(
        body["candidates"][0]["pending_destinations"]
            .as_array()
            .unwrap()
            .len(),
        3
    );

    let (status, _) = send(&app, Method::POST, "/api/scheduler/trigger").await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, Method::GET, "/api/candidates").await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn candidates_reject_bad_hours() {
    let deps = deps();
    let (app, _) = app(&deps);

    let (status, body) = send(&app, Method::GET, "/api/candidates?hours=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "bad_request");

    let (status, body) = send(&app, Method::GET, "/api/candidates?hours=soon").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "bad_request");
}

#[tokio::test]
async fn get_job_includes_deliveries() {
    let deps = deps();
    let (app, _) = app(&deps);

    let (status, body) = send(&app, Method::POST, "/api/jobs/job_1/publish").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job_id"], "job_1");
    assert_eq!(body["destinations"].as_array().unwrap().len(), 3);

    let (status, body) = send(&app, Method::GET, "/api/jobs/job_1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job"]["title"], "Data Analyst");
    assert_eq!(body["validation_error"], Value::Null);
    assert_eq!(body["deliveries"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let deps = deps();
    let (app, _) = app(&deps);

    let (status, body) = send(&app, Method::GET, "/api/jobs/job_missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");

    let (status, _) = send(&app, Method::POST, "/api/jobs/job_missing/publish").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn publishing_unpublished_job_is_bad_request() {
    let deps = deps();
    let (app, _) = app(&deps);

    let (status, body) = send(&app, Method::POST, "/api/jobs/job_draft/publish").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "job job_draft is not published");
    assert_eq!(deps.ledger.records().len(), 0);
}

// =============================================================================
// Scheduler
// =============================================================================

#[tokio::test]
async fn trigger_returns_summary_and_updates_status() {
    let deps = deps();
    let (app, _) = app(&deps);

    let (status, body) = send(&app, Method::POST, "/api/scheduler/trigger").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trigger"], "manual");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["published"], 3);

    let (_, status_body) = send(&app, Method::GET, "/api/scheduler/status").await;
    assert_eq!(status_body["total_runs"], 1);
    assert_eq!(status_body["cycle_in_progress"], false);
    assert_eq!(status_body["last_summary"]["cycle_id"], body["cycle_id"]);
}

#[tokio::test]
async fn trigger_while_cycle_runs_is_conflict() {
    let created = Utc::now() - chrono::Duration::minutes(10);
    let deps = TestDependencies::new()
        .mock_source(MockJobSource::new().with_rows(vec![job_row("job_1", "Data Analyst", created)]))
        .mock_publishers(vec![
            MockPublisher::new(Destination::Telegram).with_delay(Duration::from_millis(400))
        ]);
    let (app, coordinator) = app(&deps);

    let running = tokio::spawn(async move { coordinator.tick().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (status, body) = send(&app, Method::POST, "/api/scheduler/trigger").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "busy");

    running.await.unwrap();
    assert_eq!(deps.ledger.records().len(), 1);
}

// =============================================================================
// Deliveries, stats and preview
// =============================================================================

#[tokio::test]
async fn recent_deliveries_and_stats_reflect_the_ledger() {
    let deps = deps();
    deps.publisher(Destination::Facebook)
        .unwrap()
        .fail_when_contains(
            "Data Analyst",
            relay_core::kernel::PublishError::Permanent("bad token".into()),
        );
    let (app, _) = app(&deps);
    send(&app, Method::POST, "/api/scheduler/trigger").await;

    let (status, body) = send(&app, Method::GET, "/api/deliveries/recent?hours=1&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (status, body) = send(&app, Method::GET, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_delivered"], 2);
    assert_eq!(body["total_failed"], 1);
    assert_eq!(body["total_runs"], 1);
}

#[tokio::test]
async fn recent_deliveries_reject_bad_limit() {
    let deps = deps();
    let (app, _) = app(&deps);

    let (status, _) = send(&app, Method::GET, "/api/deliveries/recent?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn preview_renders_without_sending() {
    let deps = deps();
    let (app, _) = app(&deps);

    let (status, body) = send(&app, Method::GET, "/api/preview/job_1?destination=telegram").await;
    assert_eq!(status, StatusCode::OK);
    let previews = body["previews"].as_array().unwrap();
    assert_eq!(previews.len(), 1);
    assert_eq!(previews[0]["destination"], "telegram");
    assert!(previews[0]["text"]
        .as_str()
        .unwrap()
        .starts_with("📌 *Data Analyst*"));

    let (_, body) = send(&app, Method::GET, "/api/preview/job_1").await;
    assert_eq!(body["previews"].as_array().unwrap().len(), 3);

    for publisher in &deps.publishers {
        assert_eq!(publisher.call_count(), 0);
    }
    assert!(deps.ledger.records().is_empty());
}

#[tokio::test]
async fn preview_rejects_unknown_destination() {
    let deps = deps();
    let (app, _) = app(&deps);

    let (status, body) = send(&app, Method::GET, "/api/preview/job_1?destination=myspace").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "bad_request");
}
