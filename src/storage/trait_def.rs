use crate::models::{Event, MetricsFilter, MetricsRows};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Other(err.into())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Other(err.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert the event unless one with the same dedupe key already exists.
    ///
    /// Must be atomic on the dedupe key: of any number of concurrent calls
    /// carrying the same key, exactly one returns `true`.
    async fn insert_if_absent(&self, event: &Event) -> StorageResult<bool>;
}

#[async_trait]
pub trait MetricsReader: Send + Sync {
    /// Count matching events, shaped by the filter's group mode
    async fn evaluate(&self, filter: &MetricsFilter) -> StorageResult<MetricsRows>;
}

#[async_trait]
pub trait Storage: EventStore + MetricsReader {
    /// Initialize the storage (create tables, indexes)
    async fn init(&self) -> Result<()>;
}
