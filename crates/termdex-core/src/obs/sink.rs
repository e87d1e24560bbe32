//! Metrics sink boundary.
//!
//! Engine logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
use crate::obs::metrics;
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = RefCell::new(None);
}

///
/// DecisionKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecisionKind {
    Continue,
    Match,
    Stop,
    Skip,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    TermsGenerated { terms: u64, has_truncation: bool },
    TermTruncated,
    QueryExtracted { permutations: u64 },
    ScanDecision { kind: DecisionKind },
    Recheck,
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default thread-local sink used when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        metrics::with_state_mut(|m| match event {
            MetricsEvent::TermsGenerated {
                terms,
                has_truncation,
            } => {
                m.documents_indexed = m.documents_indexed.saturating_add(1);
                m.terms_generated = m.terms_generated.saturating_add(terms);
                if has_truncation {
                    m.documents_with_truncation = m.documents_with_truncation.saturating_add(1);
                }
            }
            MetricsEvent::TermTruncated => {
                m.terms_truncated = m.terms_truncated.saturating_add(1);
            }
            MetricsEvent::QueryExtracted { permutations } => {
                m.queries_extracted = m.queries_extracted.saturating_add(1);
                m.query_permutations = m.query_permutations.saturating_add(permutations);
            }
            MetricsEvent::ScanDecision { kind } => match kind {
                DecisionKind::Continue => m.scan_continue = m.scan_continue.saturating_add(1),
                DecisionKind::Match => m.scan_match = m.scan_match.saturating_add(1),
                DecisionKind::Stop => m.scan_stop = m.scan_stop.saturating_add(1),
                DecisionKind::Skip => m.scan_skip = m.scan_skip.saturating_add(1),
            },
            MetricsEvent::Recheck => m.rechecks = m.rechecks.saturating_add(1),
        });
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // - `ptr` was produced from a valid `&dyn MetricsSink` in `with_metrics_sink`.
        // - `with_metrics_sink` restores the previous pointer on every exit,
        //   including unwinding, so `ptr` never outlives the borrowed sink.
        // - `record` is synchronous and never stores `ptr` beyond this call.
        unsafe { (&*ptr).record(event) };
    } else {
        GLOBAL_METRICS_SINK.record(event);
    }
}

/// Snapshot the current counters.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all counters.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
pub fn with_metrics_sink<T>(sink: &dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // - `sink_ptr` is installed only for this dynamic scope and `Guard`
    //   restores the previous slot on all exits.
    // - Only shared access is exposed through the erased pointer.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn MetricsSink, *const dyn MetricsSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink_ptr));
    let _guard = Guard(prev);

    f()
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingSink<'a> {
        calls: &'a Cell<u64>,
    }

    impl MetricsSink for CountingSink<'_> {
        fn record(&self, _: MetricsEvent) {
            self.calls.set(self.calls.get().saturating_add(1));
        }
    }

    #[test]
    fn override_receives_events_and_is_restored() {
        metrics_reset_all();
        let calls = Cell::new(0);
        let sink = CountingSink { calls: &calls };

        with_metrics_sink(&sink, || {
            record(MetricsEvent::TermTruncated);
            record(MetricsEvent::Recheck);
        });
        assert_eq!(calls.get(), 2);
        assert_eq!(metrics_report().counters.terms_truncated, 0);

        record(MetricsEvent::TermTruncated);
        assert_eq!(calls.get(), 2);
        assert_eq!(metrics_report().counters.terms_truncated, 1);
    }

    #[test]
    fn override_is_restored_after_panic() {
        metrics_reset_all();
        let calls = Cell::new(0);
        let sink = CountingSink { calls: &calls };

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            with_metrics_sink(&sink, || panic!("boom"));
        }));
        assert!(result.is_err());

        record(MetricsEvent::Recheck);
        assert_eq!(calls.get(), 0);
        assert_eq!(metrics_report().counters.rechecks, 1);
    }

    #[test]
    fn report_averages_guard_against_zero() {
        metrics_reset_all();
        assert!(metrics_report().avg_terms_per_document.abs() < f64::EPSILON);

        record(MetricsEvent::TermsGenerated {
            terms: 4,
            has_truncation: true,
        });
        record(MetricsEvent::TermsGenerated {
            terms: 2,
            has_truncation: false,
        });
        let report = metrics_report();

        assert_eq!(report.counters.documents_with_truncation, 1);
        assert!((report.avg_terms_per_document - 3.0).abs() < f64::EPSILON);
    }
}
