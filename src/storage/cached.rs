use crate::models::{MetricsFilter, MetricsRows};
use crate::storage::{MetricsReader, StorageResult};
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Read-through cache in front of a metrics reader.
///
/// Results are keyed by the validated filter and may be up to `ttl` stale.
/// Failed reads are not cached.
pub struct CachedMetricsReader {
    /// Underlying reader
    inner: Arc<dyn MetricsReader>,
    /// Query results (Moka cache)
    cache: Cache<MetricsFilter, MetricsRows>,
}

impl CachedMetricsReader {
    pub fn new(inner: Arc<dyn MetricsReader>, max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }

    /// Drop every cached result
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl MetricsReader for CachedMetricsReader {
    async fn evaluate(&self, filter: &MetricsFilter) -> StorageResult<MetricsRows> {
        if let Some(cached) = self.cache.get(filter).await {
            tracing::debug!(event_name = filter.event_name(), "metrics cache hit");
            return Ok(cached);
        }

        let rows = self.inner.evaluate(filter).await?;
        self.cache.insert(filter.clone(), rows.clone()).await;

        Ok(rows)
    }
}
