//! In-process event store
//!
//! Events live in a `DashMap` keyed by dedupe key. The entry API holds the
//! shard lock across check-and-insert, which gives the same atomicity the SQL
//! backends get from their unique constraint. Aggregation is computed by
//! scanning the map, so this backend is meant for development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashSet};

use crate::models::{Counts, Event, GroupMode, MetricsFilter, MetricsRows};
use crate::storage::{EventStore, MetricsReader, Storage, StorageResult};

#[derive(Default)]
pub struct MemoryStorage {
    events: DashMap<String, Event>,
}

/// Running count plus the distinct users seen so far
#[derive(Default)]
struct Tally {
    total: i64,
    users: HashSet<String>,
}

impl Tally {
    fn add(&mut self, user_id: &str) {
        self.total += 1;
        if !self.users.contains(user_id) {
            self.users.insert(user_id.to_string());
        }
    }

    fn counts(&self) -> Counts {
        Counts::new(self.total, self.users.len() as i64)
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, dedupe_key: &str) -> Option<Event> {
        self.events.get(dedupe_key).map(|entry| entry.value().clone())
    }

    fn matches(filter: &MetricsFilter, event: &Event) -> bool {
        let secs = event.event_time.timestamp();
        event.event_name == filter.event_name()
            && secs >= filter.from()
            && secs <= filter.to()
            && filter.channel().map_or(true, |c| c == event.channel)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStorage {
    async fn insert_if_absent(&self, event: &Event) -> StorageResult<bool> {
        match self.events.entry(event.dedupe_key().to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(event.clone());
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl MetricsReader for MemoryStorage {
    async fn evaluate(&self, filter: &MetricsFilter) -> StorageResult<MetricsRows> {
        let matching = self
            .events
            .iter()
            .filter(|entry| Self::matches(filter, entry.value()));

        let rows = match filter.group_mode() {
            GroupMode::None => {
                let mut tally = Tally::default();
                for entry in matching {
                    tally.add(&entry.value().user_id);
                }
                MetricsRows::Summary(tally.counts())
            }
            GroupMode::ByChannel => {
                let mut groups: BTreeMap<String, Tally> = BTreeMap::new();
                for entry in matching {
                    let event = entry.value();
                    groups
                        .entry(event.channel.clone())
                        .or_default()
                        .add(&event.user_id);
                }
                MetricsRows::Channels(
                    groups
                        .into_iter()
                        .map(|(channel, tally)| (channel, tally.counts()))
                        .collect(),
                )
            }
            GroupMode::ByTime(interval) => {
                let mut groups: BTreeMap<DateTime<Utc>, Tally> = BTreeMap::new();
                for entry in matching {
                    let event = entry.value();
                    groups
                        .entry(interval.truncate(event.event_time))
                        .or_default()
                        .add(&event.user_id);
                }
                MetricsRows::Buckets(
                    groups
                        .into_iter()
                        .map(|(bucket, tally)| (bucket, tally.counts()))
                        .collect(),
                )
            }
        };

        Ok(rows)
    }
}
