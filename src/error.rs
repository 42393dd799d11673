use thiserror::Error;

use crate::storage::StorageError;

/// Caller-input faults. Never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("event_name, channel and user_id are required")]
    MissingField,
    #[error("timestamp cannot be in the future")]
    FutureTimestamp,
    #[error("timestamp is out of range")]
    TimestampOutOfRange,
    #[error("invalid metrics query")]
    InvalidQuery,
    #[error("invalid time range")]
    InvalidTimeRange,
    #[error("invalid group_by value")]
    InvalidGroupBy,
    #[error("invalid interval for time grouping")]
    InvalidInterval,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("metrics reader returned {found} rows for group mode '{expected}'")]
    UnexpectedRows {
        expected: &'static str,
        found: &'static str,
    },
}
