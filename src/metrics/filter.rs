use chrono::DateTime;

use crate::error::ValidationError;
use crate::models::{GroupMode, Interval, MetricsFilter, MetricsQuery};

/// Validate raw query parameters into a [`MetricsFilter`].
///
/// Rules are checked in a fixed order and the first violation is returned:
/// event name, then time range, then grouping. `interval` is only read when
/// grouping by time. An empty channel is treated as no channel filter.
pub fn validate_filter(query: MetricsQuery) -> Result<MetricsFilter, ValidationError> {
    if query.event_name.is_empty() {
        return Err(ValidationError::InvalidQuery);
    }

    if query.from <= 0 || query.to <= 0 || query.from > query.to {
        return Err(ValidationError::InvalidTimeRange);
    }
    if DateTime::from_timestamp(query.to, 0).is_none() {
        return Err(ValidationError::InvalidTimeRange);
    }

    let group_mode = match query.group_by.as_str() {
        "" => GroupMode::None,
        "channel" => GroupMode::ByChannel,
        "time" => GroupMode::ByTime(parse_interval(&query.interval)?),
        _ => return Err(ValidationError::InvalidGroupBy),
    };

    Ok(MetricsFilter {
        event_name: query.event_name,
        from: query.from,
        to: query.to,
        channel: query.channel.filter(|c| !c.is_empty()),
        group_mode,
    })
}

fn parse_interval(interval: &str) -> Result<Interval, ValidationError> {
    match interval {
        "hour" => Ok(Interval::Hour),
        "day" => Ok(Interval::Day),
        _ => Err(ValidationError::InvalidInterval),
    }
}
