use crate::models::{Counts, Event, GroupMode, MetricsFilter, MetricsRows};
use crate::storage::{EventStore, MetricsReader, Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &MetricsFilter) {
    builder
        .push(" FROM events WHERE event_name = ")
        .push_bind(filter.event_name().to_string())
        .push(" AND event_time BETWEEN ")
        .push_bind(filter.from_time())
        .push(" AND ")
        .push_bind(filter.to_time());

    if let Some(channel) = filter.channel() {
        builder.push(" AND channel = ").push_bind(channel.to_string());
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id BIGSERIAL PRIMARY KEY,
                event_name TEXT NOT NULL,
                channel TEXT NOT NULL,
                campaign_id TEXT,
                user_id TEXT NOT NULL,
                event_time TIMESTAMPTZ NOT NULL,
                tags TEXT[] NOT NULL DEFAULT '{}',
                metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
                dedupe_key TEXT NOT NULL UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
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
impl EventStore for PostgresStorage {
    async fn insert_if_absent(&self, event: &Event) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO events (
                event_name, channel, campaign_id, user_id, event_time,
                tags, metadata, dedupe_key
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (dedupe_key) DO NOTHING
            "#,
        )
        .bind(event.event_name.as_str())
        .bind(event.channel.as_str())
        .bind(event.campaign_id.as_deref())
        .bind(event.user_id.as_str())
        .bind(event.event_time)
        .bind(event.tags.as_slice())
        .bind(Json(&event.metadata))
        .bind(event.dedupe_key())
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl MetricsReader for PostgresStorage {
    async fn evaluate(&self, filter: &MetricsFilter) -> StorageResult<MetricsRows> {
        match filter.group_mode() {
            GroupMode::None => {
                let mut builder = QueryBuilder::<Postgres>::new(
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
                let mut builder = QueryBuilder::<Postgres>::new(
                    "SELECT channel, COUNT(*) AS total_count, COUNT(DISTINCT user_id) AS unique_users",
                );
                push_filter(&mut builder, filter);
                builder.push(r#" GROUP BY channel ORDER BY channel COLLATE "C""#);

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
                // Truncate in UTC regardless of the session time zone
                let mut builder = QueryBuilder::<Postgres>::new(format!(
                    "SELECT date_trunc('{}', event_time AT TIME ZONE 'UTC') AT TIME ZONE 'UTC' AS bucket, \
                     COUNT(*) AS total_count, COUNT(DISTINCT user_id) AS unique_users",
                    interval.as_str()
                ));
                push_filter(&mut builder, filter);
                builder.push(" GROUP BY bucket ORDER BY bucket");

                let rows = builder
                    .build_query_as::<(DateTime<Utc>, i64, i64)>()
                    .fetch_all(self.pool.as_ref())
                    .await?
                    .into_iter()
                    .map(|(bucket, total, unique)| (bucket, Counts::new(total, unique)))
                    .collect();

                Ok(MetricsRows::Buckets(rows))
            }
        }
    }
}
