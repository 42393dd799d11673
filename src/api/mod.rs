//! HTTP transport for the ingestion and metrics services

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_api_router;
