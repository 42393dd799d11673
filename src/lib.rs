pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod models;
pub mod storage;
