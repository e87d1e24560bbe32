//! Module: consistent
//! Responsibility: decide whether the query terms a document matched
//! satisfy the whole query, and whether the host must recheck it.
//! Does not own: per-term matching (see `scan`).

use crate::{
    obs::sink::{self, MetricsEvent},
    query::{QueryStrategy, ScanState},
    scan::ScanError,
};

///
/// Consistency
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Consistency {
    pub is_match: bool,
    pub requires_recheck: bool,
}

impl Consistency {
    const fn new(is_match: bool, requires_recheck: bool) -> Self {
        Self {
            is_match,
            requires_recheck,
        }
    }
}

/// Evaluate `check`, where `check[i]` is whether query term `i` matched
/// one of the document's stored terms.
pub fn evaluate(check: &[bool], state: &ScanState) -> Result<Consistency, ScanError> {
    let first = check.first().copied().unwrap_or(false);

    let result = match state.strategy {
        QueryStrategy::IsMultiKey
        | QueryStrategy::HasCorrelatedReducedTerms
        | QueryStrategy::HasTruncatedTerms => Consistency::new(first, false),
        QueryStrategy::UniqueEqual => Consistency::new(
            check.iter().any(|c| *c),
            state.flags.requires_runtime_recheck,
        ),
        QueryStrategy::CompositeQuery => evaluate_composite(check, state),
        other => return Err(ScanError::UnsupportedStrategy(other.code())),
    };

    if result.is_match && result.requires_recheck {
        sink::record(MetricsEvent::Recheck);
    }

    Ok(result)
}

fn evaluate_composite(check: &[bool], state: &ScanState) -> Consistency {
    let flags = &state.flags;
    let meta = &state.meta;
    let matched = |index: usize| check.get(index).copied().unwrap_or(false);

    let truncation_hit = flags.has_truncation && meta.truncation_term_index.is_some_and(matched);
    let requires_recheck = flags.requires_runtime_recheck || truncation_hit;

    if !flags.has_multiple_scan_keys_per_path && !flags.has_truncation {
        return Consistency::new(check.iter().any(|c| *c), requires_recheck);
    }

    if meta.num_scan_keys() == 0 {
        return Consistency::new(matched(0), requires_recheck);
    }

    // every scan key needs one of its query terms; an empty key never matches
    let is_match = meta
        .scan_key_map
        .iter()
        .all(|terms| terms.iter().any(|i| matched(*i)));

    Consistency::new(is_match, requires_recheck)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        options::IndexOptions,
        query::{ScanFlags, ScanMeta, extract_query},
        value::Value,
    };
    use std::sync::Arc;

    fn state(flags: ScanFlags, scan_key_map: Vec<Vec<usize>>, truncation: Option<usize>) -> ScanState {
        ScanState::new(
            QueryStrategy::CompositeQuery,
            flags,
            Arc::from(Vec::new()),
            Arc::new(ScanMeta {
                num_paths: 2,
                has_wildcard: false,
                scan_key_map,
                truncation_term_index: truncation,
            }),
        )
    }

    #[test]
    fn single_key_per_path_accepts_any_match() {
        let state = state(ScanFlags::default(), vec![vec![0, 1]], None);

        assert!(evaluate(&[false, true], &state).expect("evaluate").is_match);
        assert!(!evaluate(&[false, false], &state).expect("evaluate").is_match);
    }

    #[test]
    fn every_scan_key_needs_a_match() {
        let flags = ScanFlags {
            has_multiple_scan_keys_per_path: true,
            ..ScanFlags::default()
        };
        let state = state(flags, vec![vec![0], vec![1]], None);

        let both = evaluate(&[true, true], &state).expect("evaluate");
        let one = evaluate(&[true, false], &state).expect("evaluate");
        assert_eq!(both, Consistency::new(true, false));
        assert!(!one.is_match);
    }

    #[test]
    fn empty_scan_keys_never_match() {
        let flags = ScanFlags {
            has_multiple_scan_keys_per_path: true,
            ..ScanFlags::default()
        };
        let state = state(flags, vec![vec![0], Vec::new()], None);

        assert!(!evaluate(&[true], &state).expect("evaluate").is_match);
    }

    #[test]
    fn matched_truncation_term_forces_recheck() {
        let flags = ScanFlags {
            has_truncation: true,
            ..ScanFlags::default()
        };
        let state = state(flags, vec![vec![0]], Some(1));

        assert_eq!(
            evaluate(&[true, true], &state).expect("evaluate"),
            Consistency::new(true, true)
        );
        assert_eq!(
            evaluate(&[true, false], &state).expect("evaluate"),
            Consistency::new(true, false)
        );
    }

    #[test]
    fn no_scan_keys_uses_the_first_term() {
        let flags = ScanFlags {
            has_truncation: true,
            requires_runtime_recheck: true,
            ..ScanFlags::default()
        };
        let state = state(flags, Vec::new(), None);

        assert_eq!(
            evaluate(&[true], &state).expect("evaluate"),
            Consistency::new(true, true)
        );
        assert!(!evaluate(&[false], &state).expect("evaluate").is_match);
    }

    #[test]
    fn root_sentinels_never_recheck() {
        let options = IndexOptions::from_paths(["a"]).expect("options");
        let ex = extract_query(&Value::Null, QueryStrategy::HasTruncatedTerms, &options)
            .expect("extract");

        assert_eq!(
            evaluate(&[true], &ex.scan_states[0]).expect("evaluate"),
            Consistency::new(true, false)
        );
    }

    #[test]
    fn unique_equal_carries_the_extraction_recheck() {
        let options = IndexOptions::from_paths(["a", "b"]).expect("options");
        let query = Value::parse_json(r#"{"a": 1}"#).expect("json");
        let ex = extract_query(&query, QueryStrategy::UniqueEqual, &options).expect("extract");

        assert_eq!(
            evaluate(&[true], &ex.scan_states[0]).expect("evaluate"),
            Consistency::new(true, true)
        );
    }

    #[test]
    fn operator_strategies_are_rejected() {
        let mut state = state(ScanFlags::default(), Vec::new(), None);
        state.strategy = QueryStrategy::Regex;

        assert!(evaluate(&[true], &state).is_err());
    }

    #[test]
    fn in_list_matches_any_value() {
        let options = IndexOptions::from_paths(["a", "b"]).expect("options");
        let query = Value::parse_json(r#"{"q": [{"op": 6, "a": [1, 2]}, {"op": 1, "b": "x"}]}"#)
            .expect("json");
        let ex = extract_query(&query, QueryStrategy::CompositeQuery, &options).expect("extract");

        assert!(evaluate(&[false, true], &ex.scan_states[0]).expect("evaluate").is_match);
    }
}
