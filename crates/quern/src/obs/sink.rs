//! Metrics sink boundary.
//!
//! Engine logic MUST NOT depend on `obs::metrics` directly.
//! All instrumentation flows through `MetricsEvent` and `MetricsSink`;
//! this module is the only bridge to the counter state.

use crate::obs::metrics::{self, EventState};
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = const { RefCell::new(None) };
}

///
/// MetricsEvent
///

#[derive(Clone, Debug)]
pub enum MetricsEvent {
    PageFetched { entity: String, rows: u64 },
    SliceFetched { entity: String, rows: u64 },
    CountExecuted { entity: String },
    CountCacheHit { entity: String },
    CountCacheMiss { entity: String },
    MutationExecuted { entity: String, affected: u64 },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

///
/// GlobalMetricsSink
/// Default sink writing into the thread-local counter state. Acts as the
/// concrete sink when no scoped override is installed.
///

struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::PageFetched { entity, rows: _ } => metrics::with_state_mut(|m| {
                m.pages_fetched = m.pages_fetched.saturating_add(1);
                let entry = m.entities.entry(entity).or_default();
                entry.pages_fetched = entry.pages_fetched.saturating_add(1);
            }),
            MetricsEvent::SliceFetched { entity, rows: _ } => metrics::with_state_mut(|m| {
                m.slices_fetched = m.slices_fetched.saturating_add(1);
                let entry = m.entities.entry(entity).or_default();
                entry.slices_fetched = entry.slices_fetched.saturating_add(1);
            }),
            MetricsEvent::CountExecuted { entity } => metrics::with_state_mut(|m| {
                m.counts_executed = m.counts_executed.saturating_add(1);
                let entry = m.entities.entry(entity).or_default();
                entry.counts_executed = entry.counts_executed.saturating_add(1);
            }),
            MetricsEvent::CountCacheHit { .. } => metrics::with_state_mut(|m| {
                m.count_cache_hits = m.count_cache_hits.saturating_add(1);
            }),
            MetricsEvent::CountCacheMiss { .. } => metrics::with_state_mut(|m| {
                m.count_cache_misses = m.count_cache_misses.saturating_add(1);
            }),
            MetricsEvent::MutationExecuted { entity, affected } => metrics::with_state_mut(|m| {
                m.mutations_executed = m.mutations_executed.saturating_add(1);
                m.rows_affected = m.rows_affected.saturating_add(affected);
                let entry = m.entities.entry(entity).or_default();
                entry.mutations_executed = entry.mutations_executed.saturating_add(1);
                entry.rows_affected = entry.rows_affected.saturating_add(affected);
            }),
        }
    }
}

pub(crate) fn record(event: MetricsEvent) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match sink {
        Some(sink) => sink.record(event),
        None => GlobalMetricsSink.record(event),
    }
}

/// Snapshot the current counter state for endpoint/test plumbing.
#[must_use]
pub fn metrics_report() -> EventState {
    metrics::snapshot()
}

/// Reset all counters.
pub fn metrics_reset() {
    metrics::reset();
}

/// Run a closure with a temporary metrics sink override on this thread.
/// The previous sink is restored on all exits, including panics.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0.take();
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);
    f()
}

///
/// TESTS
///
