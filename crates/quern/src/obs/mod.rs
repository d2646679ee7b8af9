//! Observability: engine telemetry and the sink abstraction.
//!
//! Engine logic does not touch the counter state directly; all
//! instrumentation flows through `MetricsEvent` and `MetricsSink`.

pub(crate) mod metrics;
pub(crate) mod sink;

pub use metrics::EventState;
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset, with_metrics_sink};
