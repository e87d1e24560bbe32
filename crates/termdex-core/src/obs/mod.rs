//! Observability: runtime counters and the sink abstraction.
//!
//! Engine code records through `sink::record` only.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventCounters, EventReport};
pub use sink::{
    DecisionKind, MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink,
};
