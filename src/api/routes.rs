use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::handlers::{bulk_create_events, create_event, get_metrics, health_check, AppState};

pub fn create_api_router(state: AppState, request_timeout: Duration) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/health", get(health_check))
        .route("/events", post(create_event))
        .route("/events/bulk", post(bulk_create_events))
        .route("/metrics", get(get_metrics))
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}
