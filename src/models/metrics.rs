use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Raw metrics query parameters, before validation
#[derive(Debug, Clone, Default)]
pub struct MetricsQuery {
    pub event_name: String,
    /// Unix timestamp (seconds), inclusive
    pub from: i64,
    /// Unix timestamp (seconds), inclusive
    pub to: i64,
    pub channel: Option<String>,
    /// "", "channel" or "time"
    pub group_by: String,
    /// "hour" or "day", only read when grouping by time
    pub interval: String,
}

/// Width of a time bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Hour,
    Day,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Hour => "hour",
            Interval::Day => "day",
        }
    }

    pub fn seconds(self) -> i64 {
        match self {
            Interval::Hour => 3600,
            Interval::Day => 86400,
        }
    }

    /// Start of the UTC hour/day containing `time`
    pub fn truncate(self, time: DateTime<Utc>) -> DateTime<Utc> {
        let secs = time.timestamp();
        let start = secs - secs.rem_euclid(self.seconds());
        DateTime::from_timestamp(start, 0).unwrap_or(time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupMode {
    None,
    ByChannel,
    ByTime(Interval),
}

impl GroupMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupMode::None => "",
            GroupMode::ByChannel => "channel",
            GroupMode::ByTime(_) => "time",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, GroupMode::None)
    }
}

impl Serialize for GroupMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A validated metrics filter.
///
/// Only produced by [`crate::metrics::validate_filter`], so every instance
/// holds a non-empty event name and a representable `from <= to` range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricsFilter {
    pub(crate) event_name: String,
    pub(crate) from: i64,
    pub(crate) to: i64,
    pub(crate) channel: Option<String>,
    pub(crate) group_mode: GroupMode,
}

impl MetricsFilter {
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn from(&self) -> i64 {
        self.from
    }

    pub fn to(&self) -> i64 {
        self.to
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn group_mode(&self) -> GroupMode {
        self.group_mode
    }

    pub fn from_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.from, 0).unwrap_or_default()
    }

    pub fn to_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.to, 0).unwrap_or_default()
    }
}

/// Event and distinct-user counts for one slice of the filtered events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub total_count: i64,
    pub unique_users: i64,
}

impl Counts {
    pub fn new(total_count: i64, unique_users: i64) -> Self {
        Self {
            total_count,
            unique_users,
        }
    }
}

/// Rows produced by a [`crate::storage::MetricsReader`], shaped by the group mode
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsRows {
    Summary(Counts),
    Channels(Vec<(String, Counts)>),
    Buckets(Vec<(DateTime<Utc>, Counts)>),
}

impl MetricsRows {
    pub fn kind(&self) -> &'static str {
        match self {
            MetricsRows::Summary(_) => "summary",
            MetricsRows::Channels(_) => "channels",
            MetricsRows::Buckets(_) => "buckets",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsGroup {
    /// Channel name, or RFC3339 bucket start
    pub key: String,
    pub total_count: i64,
    pub unique_users: i64,
}

/// Aggregated answer to a metrics query.
///
/// When grouped, `total_count` and `unique_users` are sums over `groups`, so a
/// user seen in two groups counts twice in `unique_users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedMetrics {
    pub event_name: String,
    pub from: i64,
    pub to: i64,
    pub total_count: i64,
    pub unique_users: i64,
    #[serde(skip_serializing_if = "GroupMode::is_none")]
    pub group_by: GroupMode,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<MetricsGroup>,
}

impl AggregatedMetrics {
    pub fn empty(filter: &MetricsFilter) -> Self {
        Self {
            event_name: filter.event_name.clone(),
            from: filter.from,
            to: filter.to,
            total_count: 0,
            unique_users: 0,
            group_by: filter.group_mode,
            groups: Vec::new(),
        }
    }
}
