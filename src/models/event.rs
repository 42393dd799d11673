use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::events::dedupe::build_dedupe_key;

/// Opaque event metadata. Stored and returned untouched.
pub type Metadata = Map<String, Value>;

/// Raw ingestion input as handed over by a transport adapter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventInput {
    #[serde(default, alias = "eventName")]
    pub event_name: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default, alias = "campaignId")]
    pub campaign_id: Option<String>,
    #[serde(default, alias = "userId")]
    pub user_id: String,
    /// Unix timestamp (seconds)
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Metadata,
}

/// Decode an explicit `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A stored user event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub event_name: String,
    pub channel: String,
    pub campaign_id: Option<String>,
    pub user_id: String,
    pub event_time: DateTime<Utc>,
    pub tags: Vec<String>,
    pub metadata: Metadata,
    dedupe_key: String,
}

impl Event {
    /// Build an event from an input that has already passed validation.
    ///
    /// An empty campaign id is treated as absent.
    pub fn from_input(input: EventInput, event_time: DateTime<Utc>) -> Self {
        let campaign_id = input.campaign_id.filter(|c| !c.is_empty());
        let dedupe_key = build_dedupe_key(
            &input.event_name,
            &input.user_id,
            &input.channel,
            campaign_id.as_deref(),
            event_time,
        );

        Self {
            event_name: input.event_name,
            channel: input.channel,
            campaign_id,
            user_id: input.user_id,
            event_time,
            tags: input.tags,
            metadata: input.metadata,
            dedupe_key,
        }
    }

    pub fn dedupe_key(&self) -> &str {
        &self.dedupe_key
    }
}

/// Result of storing a single event. Both variants are successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Created,
    Duplicate,
}

impl Outcome {
    pub fn from_created(created: bool) -> Self {
        if created {
            Outcome::Created
        } else {
            Outcome::Duplicate
        }
    }
}

/// Summary of a bulk ingestion call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    #[serde(rename = "created")]
    pub created_count: usize,
    #[serde(rename = "duplicates")]
    pub duplicate_count: usize,
}

impl BulkOutcome {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created_count += 1,
            Outcome::Duplicate => self.duplicate_count += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created_count + self.duplicate_count
    }
}
