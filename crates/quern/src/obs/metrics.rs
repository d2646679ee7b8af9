use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap};

///
/// Metrics
/// Ephemeral, in-memory counters for engine operations. Thread-local:
/// each worker sees its own window, which is what per-request services
/// want from cheap counters.
///

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventState {
    pub pages_fetched: u64,
    pub slices_fetched: u64,
    pub counts_executed: u64,
    pub count_cache_hits: u64,
    pub count_cache_misses: u64,
    pub mutations_executed: u64,
    pub rows_affected: u64,
    pub entities: BTreeMap<String, EntityCounters>,
}

///
/// EntityCounters
///

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EntityCounters {
    pub pages_fetched: u64,
    pub slices_fetched: u64,
    pub counts_executed: u64,
    pub mutations_executed: u64,
    pub rows_affected: u64,
}

thread_local! {
    static STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

pub(crate) fn with_state_mut<T>(f: impl FnOnce(&mut EventState) -> T) -> T {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

pub(crate) fn snapshot() -> EventState {
    STATE.with(|state| state.borrow().clone())
}

pub(crate) fn reset() {
    STATE.with(|state| *state.borrow_mut() = EventState::default());
}
