use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{Config, DatabaseBackend};
use crate::error::IngestError;
use crate::events::{BulkIngestionOrchestrator, EventIngestionService};
use crate::metrics::{validate_filter, MetricsAggregationService};
use crate::models::{AggregatedMetrics, BulkOutcome, EventInput, MetricsQuery, Outcome};
use crate::storage::{
    CachedMetricsReader, MemoryStorage, MetricsReader, PostgresStorage, SqliteStorage, Storage,
};

/// Core services wired against one storage backend
#[derive(Clone)]
pub struct AppState {
    pub ingestion: EventIngestionService,
    pub bulk: BulkIngestionOrchestrator,
    pub metrics: MetricsAggregationService,
}

impl AppState {
    pub fn new<S: Storage + 'static>(storage: Arc<S>, config: &Config) -> Self {
        let mut reader: Arc<dyn MetricsReader> = storage.clone();
        if config.metrics.cache_ttl_secs > 0 {
            reader = Arc::new(CachedMetricsReader::new(
                reader,
                config.metrics.cache_max_entries,
                Duration::from_secs(config.metrics.cache_ttl_secs),
            ));
        }

        let ingestion = EventIngestionService::new(storage);
        let bulk =
            BulkIngestionOrchestrator::new(ingestion.clone(), config.ingestion.bulk_concurrency);

        Self {
            ingestion,
            bulk,
            metrics: MetricsAggregationService::new(reader),
        }
    }

    /// Connect to the configured backend, create the schema and wire the services
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let database = &config.database;
        match database.backend {
            DatabaseBackend::Sqlite => {
                info!("Using SQLite storage: {}", database.url);
                let storage =
                    Arc::new(SqliteStorage::new(&database.url, database.max_connections).await?);
                storage.init().await?;
                Ok(Self::new(storage, config))
            }
            DatabaseBackend::Postgres => {
                info!("Using PostgreSQL storage");
                let storage =
                    Arc::new(PostgresStorage::new(&database.url, database.max_connections).await?);
                storage.init().await?;
                Ok(Self::new(storage, config))
            }
            DatabaseBackend::Memory => {
                info!("Using in-memory storage (events are lost on restart)");
                Ok(Self::new(Arc::new(MemoryStorage::new()), config))
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct CreateEventResponse {
    pub status: Outcome,
}

#[derive(Deserialize)]
pub struct BulkCreateEventsRequest {
    #[serde(default)]
    pub events: Vec<EventInput>,
}

/// Raw `/metrics` query string. `from`/`to` are parsed by hand so a bad
/// value gets a specific error message.
#[derive(Debug, Deserialize)]
pub struct MetricsParams {
    #[serde(alias = "eventName")]
    pub event_name: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub channel: Option<String>,
    #[serde(alias = "groupBy")]
    pub group_by: Option<String>,
    pub interval: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, error: &str, message: Option<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message,
        }),
    )
}

fn internal_error() -> ApiError {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_server_error", None)
}

fn ingest_error(err: IngestError) -> ApiError {
    match err {
        IngestError::Validation(e) => {
            error_response(StatusCode::BAD_REQUEST, "invalid_event", Some(e.to_string()))
        }
        IngestError::Storage(e) => {
            tracing::error!("Failed to store event: {}", e);
            internal_error()
        }
    }
}

fn invalid_json(rejection: JsonRejection) -> ApiError {
    error_response(
        StatusCode::BAD_REQUEST,
        "invalid_json",
        Some(rejection.body_text()),
    )
}

fn parse_timestamp(name: &str, value: &str) -> Result<i64, ApiError> {
    value.trim().parse::<i64>().map_err(|_| {
        error_response(
            StatusCode::BAD_REQUEST,
            "invalid_query",
            Some(format!("invalid '{name}' parameter")),
        )
    })
}

/// Store a single event
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EventInput>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateEventResponse>), ApiError> {
    let Json(input) = payload.map_err(invalid_json)?;

    let outcome = state.ingestion.ingest(input).await.map_err(ingest_error)?;
    let status = match outcome {
        Outcome::Created => StatusCode::CREATED,
        Outcome::Duplicate => StatusCode::OK,
    };

    Ok((status, Json(CreateEventResponse { status: outcome })))
}

/// Store a batch of events; nothing is written if any event is invalid
pub async fn bulk_create_events(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BulkCreateEventsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BulkOutcome>), ApiError> {
    let Json(request) = payload.map_err(invalid_json)?;

    if request.events.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "events_list_required",
            None,
        ));
    }

    let outcome = state
        .bulk
        .store_many(request.events)
        .await
        .map_err(ingest_error)?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Query aggregated metrics
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MetricsParams>,
) -> Result<(StatusCode, Json<AggregatedMetrics>), ApiError> {
    let (Some(from), Some(to)) = (params.from.as_deref(), params.to.as_deref()) else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "invalid_query",
            Some("from and to are required".to_string()),
        ));
    };

    let query = MetricsQuery {
        event_name: params.event_name.unwrap_or_default(),
        from: parse_timestamp("from", from)?,
        to: parse_timestamp("to", to)?,
        channel: params.channel,
        group_by: params.group_by.unwrap_or_default(),
        interval: params.interval.unwrap_or_default(),
    };

    let filter = validate_filter(query).map_err(|e| {
        error_response(StatusCode::BAD_REQUEST, "invalid_query", Some(e.to_string()))
    })?;

    match state.metrics.query(&filter).await {
        Ok(result) => Ok((StatusCode::OK, Json(result))),
        Err(e) => {
            tracing::error!("Failed to query metrics: {}", e);
            Err(internal_error())
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
