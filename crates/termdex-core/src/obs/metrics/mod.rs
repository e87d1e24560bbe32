use serde::{Deserialize, Serialize};
use std::cell::RefCell;

///
/// EventCounters
/// Ephemeral, in-memory counters for engine calls.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventCounters {
    // Write path
    pub documents_indexed: u64,
    pub terms_generated: u64,
    pub terms_truncated: u64,
    pub documents_with_truncation: u64,

    // Query compilation
    pub queries_extracted: u64,
    pub query_permutations: u64,

    // Scan decisions
    pub scan_continue: u64,
    pub scan_match: u64,
    pub scan_stop: u64,
    pub scan_skip: u64,

    // Consistency
    pub rechecks: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventCounters> = RefCell::new(EventCounters::default());
}

/// Borrow counters immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventCounters) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow counters mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventCounters) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters.
pub fn reset_all() {
    with_state_mut(|m| *m = EventCounters::default());
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    pub counters: EventCounters,
    pub avg_terms_per_document: f64,
    pub avg_permutations_per_query: f64,
}

/// Build a report from the in-memory counters.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn report() -> EventReport {
    let counters = with_state(Clone::clone);

    let ratio = |num: u64, den: u64| {
        if den > 0 {
            num as f64 / den as f64
        } else {
            0.0
        }
    };

    EventReport {
        avg_terms_per_document: ratio(counters.terms_generated, counters.documents_indexed),
        avg_permutations_per_query: ratio(
            counters.query_permutations,
            counters.queries_extracted,
        ),
        counters,
    }
}
