pub mod event;
pub mod metrics;

pub use event::{BulkOutcome, Event, EventInput, Metadata, Outcome};
pub use metrics::{
    AggregatedMetrics, Counts, GroupMode, Interval, MetricsFilter, MetricsGroup, MetricsQuery,
    MetricsRows,
};
