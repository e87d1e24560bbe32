//! Term engine for composite multi-path document indexes: term encoding,
//! document term generation, query bound extraction, scan comparison and
//! match consistency, with the ergonomics exported via the `prelude`.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod composite;
pub mod consistent;
pub mod debug;
pub mod error;
pub mod generate;
pub mod obs;
pub mod options;
pub mod ordering;
pub mod query;
pub mod scan;
pub mod serialize;
pub mod term;
pub mod value;

pub use composite::MAX_COMPOSITE_PATHS;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, sinks, serializers, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        consistent::{Consistency, evaluate},
        generate::{DocumentTermSet, generate_terms},
        options::{IndexOptions, IndexedPath},
        query::{CompositeQuery, QueryExtraction, QueryPredicate, QueryStrategy, extract_query},
        scan::{ScanDecision, compare_partial, skip_transform},
        term::SerializedTerm,
        value::Value,
    };
}
