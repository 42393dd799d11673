use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::models::EventInput;

/// Validate an ingestion input against the current wall clock.
///
/// Returns the event time as a UTC instant.
pub fn validate_event(input: &EventInput) -> Result<DateTime<Utc>, ValidationError> {
    validate_event_at(input, Utc::now())
}

/// Validate an ingestion input against `now`.
///
/// Required fields are checked before the timestamp, so an input that is
/// both incomplete and future-dated reports `MissingField`.
pub fn validate_event_at(
    input: &EventInput,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ValidationError> {
    if input.event_name.is_empty() || input.channel.is_empty() || input.user_id.is_empty() {
        return Err(ValidationError::MissingField);
    }

    if input.timestamp > now.timestamp() {
        return Err(ValidationError::FutureTimestamp);
    }

    DateTime::from_timestamp(input.timestamp, 0).ok_or(ValidationError::TimestampOutOfRange)
}
