//! HTTP API integration tests
//!
//! These tests drive the router with `oneshot` requests against in-memory
//! and SQLite backends.

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tally::api::{self, AppState};
use tally::config::Config;
use tally::models::{Event, MetricsFilter, MetricsRows};
use tally::storage::{
    EventStore, MemoryStorage, MetricsReader, SqliteStorage, Storage, StorageError, StorageResult,
};
use tower::ServiceExt;

const BASE: i64 = 1_701_943_200; // 2023-12-07T10:00:00Z

fn create_memory_app() -> Router {
    let state = AppState::new(Arc::new(MemoryStorage::new()), &Config::default());
    api::create_api_router(state, Duration::from_secs(30))
}

async fn create_sqlite_app() -> Router {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    let state = AppState::new(Arc::new(storage), &Config::default());
    api::create_api_router(state, Duration::from_secs(30))
}

/// Storage whose every call fails
struct BrokenStorage;

#[async_trait]
impl EventStore for BrokenStorage {
    async fn insert_if_absent(&self, _event: &Event) -> StorageResult<bool> {
        Err(StorageError::Other(anyhow!("connection refused")))
    }
}

#[async_trait]
impl MetricsReader for BrokenStorage {
    async fn evaluate(&self, _filter: &MetricsFilter) -> StorageResult<MetricsRows> {
        Err(StorageError::Other(anyhow!("connection refused")))
    }
}

#[async_trait]
impl Storage for BrokenStorage {
    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Storage whose calls never finish within a test's timeout
struct SlowStorage;

#[async_trait]
impl EventStore for SlowStorage {
    async fn insert_if_absent(&self, _event: &Event) -> StorageResult<bool> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(true)
    }
}

#[async_trait]
impl MetricsReader for SlowStorage {
    async fn evaluate(&self, _filter: &MetricsFilter) -> StorageResult<MetricsRows> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(StorageError::Other(anyhow!("unreachable")))
    }
}

#[async_trait]
impl Storage for SlowStorage {
    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

fn event_json(user: &str, channel: &str, ts: i64) -> Value {
    json!({
        "event_name": "product_view",
        "channel": channel,
        "campaign_id": "cmp_1",
        "user_id": user,
        "timestamp": ts,
        "tags": ["electronics"],
        "metadata": {"product_id": "prod-789"}
    })
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let app = create_memory_app();
    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "OK"}));
}

#[tokio::test]
async fn test_create_event_then_duplicate() {
    let app = create_memory_app();
    let event = event_json("user_1", "web", BASE);

    let (status, body) = send(&app, post_json("/events", &event)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "created");

    let (status, body) = send(&app, post_json("/events", &event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "duplicate");
}

#[tokio::test]
async fn test_create_event_accepts_camel_case() {
    let app = create_memory_app();
    let event = json!({
        "eventName": "signup",
        "channel": "mobile",
        "userId": "user_2",
        "campaignId": "",
        "timestamp": BASE
    });

    let (status, _) = send(&app, post_json("/events", &event)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        get(&format!("/metrics?event_name=signup&from={BASE}&to={BASE}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 1);
}

#[tokio::test]
async fn test_create_event_validation_errors() {
    let app = create_memory_app();

    let mut missing_user = event_json("user_1", "web", BASE);
    missing_user["user_id"] = json!("");
    let (status, body) = send(&app, post_json("/events", &missing_user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_event");

    let future = chrono::Utc::now().timestamp() + 3600;
    let (status, body) = send(&app, post_json("/events", &event_json("u", "web", future))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_event");
    assert_eq!(body["message"], "timestamp cannot be in the future");
}

#[tokio::test]
async fn test_create_event_malformed_body() {
    let app = create_memory_app();
    let request = Request::builder()
        .method("POST")
        .uri("/events")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_json");
}

#[tokio::test]
async fn test_bulk_create_counts() {
    let app = create_sqlite_app().await;
    let events = json!({
        "events": [
            event_json("user_1", "web", BASE),
            event_json("user_1", "web", BASE),
            event_json("user_2", "mobile", BASE + 60),
        ]
    });

    let (status, body) = send(&app, post_json("/events/bulk", &events)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"created": 2, "duplicates": 1}));

    let (status, body) = send(&app, post_json("/events/bulk", &events)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"created": 0, "duplicates": 3}));
}

#[tokio::test]
async fn test_bulk_create_rejects_empty_list() {
    let app = create_memory_app();

    let (status, body) = send(&app, post_json("/events/bulk", &json!({"events": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "events_list_required");

    let (status, body) = send(&app, post_json("/events/bulk", &json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "events_list_required");
}

#[tokio::test]
async fn test_bulk_create_invalid_item_writes_nothing() {
    let app = create_memory_app();
    let mut bad = event_json("user_3", "web", BASE);
    bad["event_name"] = json!("");
    let events = json!({
        "events": [event_json("user_1", "web", BASE), bad]
    });

    let (status, body) = send(&app, post_json("/events/bulk", &events)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_event");

    let (_, body) = send(
        &app,
        get(&format!(
            "/metrics?event_name=product_view&from={BASE}&to={}",
            BASE + 60
        )),
    )
    .await;
    assert_eq!(body["total_count"], 0);
}

#[tokio::test]
async fn test_metrics_grouping() {
    let app = create_sqlite_app().await;
    let events = json!({
        "events": [
            event_json("user_1", "web", BASE + 10),
            event_json("user_2", "web", BASE + 20),
            event_json("user_1", "mobile", BASE + 3600 + 30),
        ]
    });
    let (status, _) = send(&app, post_json("/events/bulk", &events)).await;
    assert_eq!(status, StatusCode::CREATED);

    let range = format!("event_name=product_view&from={BASE}&to={}", BASE + 7200);

    let (status, body) = send(&app, get(&format!("/metrics?{range}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 3);
    assert_eq!(body["unique_users"], 2);
    assert!(body.get("groups").is_none());

    let (_, body) = send(&app, get(&format!("/metrics?{range}&group_by=channel"))).await;
    assert_eq!(body["group_by"], "channel");
    assert_eq!(
        body["groups"],
        json!([
            {"key": "mobile", "total_count": 1, "unique_users": 1},
            {"key": "web", "total_count": 2, "unique_users": 2},
        ])
    );
    // unique users are summed across groups
    assert_eq!(body["unique_users"], 3);

    let (_, body) = send(
        &app,
        get(&format!("/metrics?{range}&group_by=time&interval=hour")),
    )
    .await;
    assert_eq!(body["group_by"], "time");
    assert_eq!(
        body["groups"],
        json!([
            {"key": "2023-12-07T10:00:00Z", "total_count": 2, "unique_users": 2},
            {"key": "2023-12-07T11:00:00Z", "total_count": 1, "unique_users": 1},
        ])
    );

    let (_, body) = send(
        &app,
        get(&format!("/metrics?{range}&channel=mobile")),
    )
    .await;
    assert_eq!(body["total_count"], 1);
}

#[tokio::test]
async fn test_metrics_query_errors() {
    let app = create_memory_app();

    for uri in [
        format!("/metrics?from={BASE}&to={BASE}"),
        "/metrics?event_name=x".to_string(),
        format!("/metrics?event_name=x&from=abc&to={BASE}"),
        format!("/metrics?event_name=x&from={}&to={BASE}", BASE + 1),
        format!("/metrics?event_name=x&from={BASE}&to={BASE}&group_by=campaign"),
        format!("/metrics?event_name=x&from={BASE}&to={BASE}&group_by=time&interval=week"),
    ] {
        let (status, body) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri: {uri}");
        assert_eq!(body["error"], "invalid_query", "uri: {uri}");
    }
}

#[tokio::test]
async fn test_storage_failures_are_internal_errors() {
    let state = AppState::new(Arc::new(BrokenStorage), &Config::default());
    let app = api::create_api_router(state, Duration::from_secs(30));

    let (status, body) = send(&app, post_json("/events", &event_json("u", "web", BASE))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal_server_error");

    let (status, _) = send(
        &app,
        post_json("/events/bulk", &json!({"events": [event_json("u", "web", BASE)]})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, body) = send(
        &app,
        get(&format!("/metrics?event_name=x&from={BASE}&to={BASE}")),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal_server_error");
}

#[tokio::test]
async fn test_create_event_accepts_null_tags_and_metadata() {
    let app = create_memory_app();
    let mut event = event_json("user_1", "web", BASE);
    event["tags"] = Value::Null;
    event["metadata"] = Value::Null;

    let (status, body) = send(&app, post_json("/events", &event)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "created");

    let (status, body) = send(
        &app,
        post_json("/events/bulk", &json!({"events": [event]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"created": 0, "duplicates": 1}));
}

#[tokio::test]
async fn test_metrics_accepts_camel_case_params() {
    let app = create_memory_app();
    let events = json!({
        "events": [
            event_json("user_1", "web", BASE),
            event_json("user_2", "mobile", BASE),
        ]
    });
    let (status, _) = send(&app, post_json("/events/bulk", &events)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        get(&format!(
            "/metrics?eventName=product_view&from={BASE}&to={BASE}&groupBy=channel"
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group_by"], "channel");
    assert_eq!(body["groups"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_slow_storage_times_out() {
    let state = AppState::new(Arc::new(SlowStorage), &Config::default());
    let app = api::create_api_router(state, Duration::from_millis(50));

    let (status, _) = send(&app, post_json("/events", &event_json("u", "web", BASE))).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);

    let (status, _) = send(
        &app,
        get(&format!("/metrics?event_name=x&from={BASE}&to={BASE}")),
    )
    .await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
}
