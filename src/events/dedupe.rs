//! Dedupe key derivation
//!
//! The key format is persisted in the `dedupe_key` column of every stored
//! event. Field order and separator must stay as they are, or re-submitted
//! events will stop matching the rows already written.

use chrono::{DateTime, Utc};

pub const DEDUPE_KEY_SEPARATOR: &str = "|";

/// Fingerprint of an event's identity:
/// `event_name|user_id|channel|campaign_id|unix_seconds`.
///
/// An absent campaign id contributes an empty segment. Sub-second precision
/// of `event_time` is dropped.
pub fn build_dedupe_key(
    event_name: &str,
    user_id: &str,
    channel: &str,
    campaign_id: Option<&str>,
    event_time: DateTime<Utc>,
) -> String {
    let seconds = event_time.timestamp().to_string();
    [
        event_name,
        user_id,
        channel,
        campaign_id.unwrap_or(""),
        seconds.as_str(),
    ]
    .join(DEDUPE_KEY_SEPARATOR)
}
