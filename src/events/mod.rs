//! Event ingestion pipeline
//!
//! Inputs flow validator → dedupe key → store. Re-submitting the same logical
//! event (same name, user, channel, campaign and second) is reported as
//! [`Outcome::Duplicate`](crate::models::Outcome) and never stored twice.

pub mod bulk;
pub mod dedupe;
pub mod service;
pub mod validator;

pub use bulk::BulkIngestionOrchestrator;
pub use dedupe::build_dedupe_key;
pub use service::EventIngestionService;
pub use validator::{validate_event, validate_event_at};
