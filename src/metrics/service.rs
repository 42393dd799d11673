use chrono::SecondsFormat;
use std::sync::Arc;

use crate::error::QueryError;
use crate::models::{AggregatedMetrics, GroupMode, MetricsFilter, MetricsGroup, MetricsRows};
use crate::storage::MetricsReader;

/// Turns a validated filter into [`AggregatedMetrics`] using a read-only
/// [`MetricsReader`].
#[derive(Clone)]
pub struct MetricsAggregationService {
    reader: Arc<dyn MetricsReader>,
}

impl MetricsAggregationService {
    pub fn new(reader: Arc<dyn MetricsReader>) -> Self {
        Self { reader }
    }

    pub async fn query(&self, filter: &MetricsFilter) -> Result<AggregatedMetrics, QueryError> {
        let rows = self.reader.evaluate(filter).await?;
        let mut result = AggregatedMetrics::empty(filter);

        match (filter.group_mode(), rows) {
            (GroupMode::None, MetricsRows::Summary(counts)) => {
                result.total_count = counts.total_count;
                result.unique_users = counts.unique_users;
                return Ok(result);
            }
            (GroupMode::ByChannel, MetricsRows::Channels(mut rows)) => {
                rows.sort_by(|a, b| a.0.cmp(&b.0));
                result.groups = rows
                    .into_iter()
                    .map(|(channel, counts)| MetricsGroup {
                        key: channel,
                        total_count: counts.total_count,
                        unique_users: counts.unique_users,
                    })
                    .collect();
            }
            (GroupMode::ByTime(_), MetricsRows::Buckets(mut rows)) => {
                rows.sort_by_key(|(bucket, _)| *bucket);
                result.groups = rows
                    .into_iter()
                    .map(|(bucket, counts)| MetricsGroup {
                        key: bucket.to_rfc3339_opts(SecondsFormat::Secs, true),
                        total_count: counts.total_count,
                        unique_users: counts.unique_users,
                    })
                    .collect();
            }
            (mode, rows) => {
                return Err(QueryError::UnexpectedRows {
                    expected: mode.as_str(),
                    found: rows.kind(),
                });
            }
        }

        // Summed per group: users active in several groups are counted once per group
        result.total_count = result.groups.iter().map(|g| g.total_count).sum();
        result.unique_users = result.groups.iter().map(|g| g.unique_users).sum();

        Ok(result)
    }
}
