//! ## Crate layout
//! - `core`: term codec, document term generation, query extraction, scan
//!   comparison, consistency, ordering, options and observability.
//!
//! The `prelude` module mirrors the surface a host index access method
//! calls into: generate on write, extract on query compilation, compare
//! and evaluate while scanning.

pub use termdex_core as core;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::{
        consistent::{Consistency, evaluate},
        generate::generate_terms,
        options::{IndexOptions, IndexedPath},
        query::{CompositeQuery, QueryPredicate, QueryStrategy, extract_composite_query, extract_query},
        scan::{ScanDecision, compare_partial, skip_transform},
        value::Value,
    };
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::prelude::*;

    fn doc(json: &str) -> Value {
        let parsed: serde_json::Value = serde_json::from_str(json).expect("json");
        Value::from_json(&parsed).expect("value")
    }

    #[test]
    fn version_is_set() {
        assert!(!super::VERSION.is_empty());
    }

    // write, extract, scan and evaluate one query end to end
    #[test]
    fn in_query_round_trip() {
        let options = IndexOptions::from_paths(["a", "b"]).expect("options");
        let stored = generate_terms(&doc(r#"{"a": [1, 2], "b": "x"}"#), &options, false)
            .expect("generate");
        let query = CompositeQuery::new(vec![
            QueryPredicate::new(QueryStrategy::In, "a", doc("[1, 2]")),
            QueryPredicate::new(QueryStrategy::Equal, "b", Value::text("x")),
        ]);
        let extraction = extract_composite_query(&query, &options).expect("extract");
        assert_eq!(extraction.total_permutations, 2);

        let mut check = vec![false; extraction.len()];
        for (i, state) in extraction.scan_states.iter().enumerate() {
            check[i] = stored.iter_bytes().any(|term| {
                compare_partial(term, state).expect("compare") == ScanDecision::Match
            });
        }
        assert_eq!(check, vec![true, true]);

        let consistency = evaluate(&check, &extraction.scan_states[0]).expect("evaluate");
        assert!(consistency.is_match);
        assert!(!consistency.requires_recheck);
    }
}
