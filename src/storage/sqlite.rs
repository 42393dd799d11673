use crate::models::{Counts, Event, GroupMode, MetricsFilter, MetricsRows};
use crate::storage::{EventStore, MetricsReader, Storage, StorageError, StorageResult};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

/// Append the shared WHERE clause. Event times are stored as unix seconds.
fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &MetricsFilter) {
    builder
        .push(" FROM events WHERE event_name = ")
        .push_bind(filter.event_name().to_string())
        .push(" AND event_time BETWEEN ")
        .push_bind(filter.from())
        .push(" AND ")
        .push_bind(filter.to());

    if let Some(channel) = filter.channel() {
        builder.push(" AND channel = ").push_bind(channel.to_string());
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_name TEXT NOT NULL,
                channel TEXT NOT NULL,
                campaign_id TEXT,
                user_id TEXT NOT NULL,
                event_time INTEGER NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                metadata TEXT NOT NULL DEFAULT '{}',
                dedupe_key TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_events_name_time ON events(event_name, event_time)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}

#[async_trait]
impl EventStore for SqliteStorage {
    async fn insert_if_absent(&self, event: &Event) -> StorageResult<bool> {
        let tags = serde_json::to_string(&event.tags)?;
        let metadata = serde_json::to_string(&event.metadata)?;
        let created_at = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO events (
                event_name, channel, campaign_id, user_id, event_time,
                tags, metadata, dedupe_key, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(dedupe_key) DO NOTHING
            "#,
        )
        .bind(event.event_name.as_str())
        .bind(event.channel.as_str())
        .bind(event.campaign_id.as_deref())
        .bind(event.user_id.as_str())
        .bind(event.event_time.timestamp())
        .bind(tags)
        .bind(metadata)
        .bind(event.dedupe_key())
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await?;

        // 0 rows: a row with this dedupe key already exists
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl MetricsReader for SqliteStorage {
    async fn evaluate(&self, filter: &MetricsFilter) -> StorageResult<MetricsRows> {
        match filter.group_mode() {
            GroupMode::None => {
                let mut builder = QueryBuilder::<Sqlite>::new(
                    "SELECT COUNT(*) AS total_count, COUNT(DISTINCT user_id) AS unique_users",
                );
                push_filter(&mut builder, filter);

                let (total, unique) = builder
                    .build_query_as::<(i64, i64)>()
                    .fetch_one(self.pool.as_ref())
                    .await?;

                Ok(MetricsRows::Summary(Counts::new(total, unique)))
            }
            GroupMode::ByChannel => {
                let mut builder = QueryBuilder::<Sqlite>::new(
                    "SELECT channel, COUNT(*) AS total_count, COUNT(DISTINCT user_id) AS unique_users",
                );
                push_filter(&mut builder, filter);
                builder.push(" GROUP BY channel ORDER BY channel");

                let rows = builder
                    .build_query_as::<(String, i64, i64)>()
                    .fetch_all(self.pool.as_ref())
                    .await?
                    .into_iter()
                    .map(|(channel, total, unique)| (channel, Counts::new(total, unique)))
                    .collect();

                Ok(MetricsRows::Channels(rows))
            }
            GroupMode::ByTime(interval) => {
                let width = interval.seconds();
                let mut builder = QueryBuilder::<Sqlite>::new(format!(
                    "SELECT (event_time / {width}) * {width} AS bucket, \
                     COUNT(*) AS total_count, COUNT(DISTINCT user_id) AS unique_users"
                ));
                push_filter(&mut builder, filter);
                builder.push(" GROUP BY bucket ORDER BY bucket");

                let rows = builder
                    .build_query_as::<(i64, i64, i64)>()
                    .fetch_all(self.pool.as_ref())
                    .await?;

                let mut buckets = Vec::with_capacity(rows.len());
                for (bucket, total, unique) in rows {
                    let start = DateTime::<Utc>::from_timestamp(bucket, 0).ok_or_else(|| {
                        StorageError::Other(anyhow!("bucket {bucket} is out of range"))
                    })?;
                    buckets.push((start, Counts::new(total, unique)));
                }

                Ok(MetricsRows::Buckets(buckets))
            }
        }
    }
}
