//! Metrics query engine: filter validation and aggregation

pub mod filter;
pub mod service;

pub use filter::validate_filter;
pub use service::MetricsAggregationService;
