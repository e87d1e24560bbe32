//! Module: query
//! Responsibility: turn query predicates into composite query terms and
//! the scan state that drives each of them.
//! Does not own: scan-time comparison or match consistency.
//! Boundary: read-path entry point; consumes `IndexOptions` read-only.

mod bounds;
mod extract;
mod operator;
mod recheck;
mod spec;
mod strategy;


use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    generate::GenerateError,
    term::{SerializedTerm, TermError},
};
use std::sync::Arc;
use thiserror::Error as ThisError;

pub use bounds::{
    BoundTerm, BoundsSet, IndexBounds, SingleBound, set_lower_bound, set_upper_bound,
    type_lower_bound, type_upper_bound,
};
pub use extract::{MAX_QUERY_PERMUTATIONS, extract_composite_query, extract_query};
pub use recheck::{BitMask, BitsOp, RecheckKind, is_valid_recheck_for_index_value};
pub use spec::{CompositeQuery, QueryPredicate};
pub use strategy::QueryStrategy;

pub(crate) use bounds::BOUND_PATH;

///
/// QueryError
///

#[derive(Debug, ThisError)]
pub enum QueryError {
    #[error("Unknown key for composite query {0}")]
    UnknownCompositeKey(String),

    #[error("extract query for composite expecting a single array value: not {0}")]
    ExpectedArray(&'static str),

    #[error("extract query composite expecting a single document value: {0}")]
    ExpectedDocument(String),

    #[error("extract query composite expecting a valid operator and value: op={op}, value={value}")]
    InvalidPredicate { op: i32, value: String },

    #[error("Unsupported strategy for composite index: {0}")]
    UnsupportedStrategy(i32),

    #[error("Query path '{0}' does not match any index paths")]
    PathNotIndexed(String),

    #[error("{0}")]
    InvalidOperand(String),

    #[error("Unable to locate scan key associated with the specified term")]
    ScanKeyNotFound,

    #[error("query expands to more than {max} index terms")]
    TooManyPermutations { max: usize },

    #[error(transparent)]
    Term(#[from] TermError),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

impl QueryError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownCompositeKey(_)
            | Self::ExpectedArray(_)
            | Self::ExpectedDocument(_)
            | Self::InvalidPredicate { .. }
            | Self::ScanKeyNotFound => ErrorClass::Internal,
            Self::UnsupportedStrategy(_)
            | Self::InvalidOperand(_)
            | Self::TooManyPermutations { .. } => ErrorClass::Unsupported,
            Self::PathNotIndexed(_) => ErrorClass::Integrity,
            Self::Term(inner) => inner.class(),
            Self::Generate(inner) => match inner {
                GenerateError::TooManyTerms { .. } => ErrorClass::Encoding,
                GenerateError::Options(options) => options.class(),
                GenerateError::Term(term) => term.class(),
            },
        }
    }
}

impl From<QueryError> for InternalError {
    fn from(err: QueryError) -> Self {
        Self::new(err.class(), ErrorOrigin::Query, err.to_string())
    }
}

///
/// ScanFlags
///
/// Per-scan flags, copied into every permutation's state.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScanFlags {
    pub is_backward: bool,
    pub has_truncation: bool,
    pub has_multiple_scan_keys_per_path: bool,
    pub requires_runtime_recheck: bool,
}

///
/// ScanMeta
///
/// Facts about the whole extraction, shared by every permutation.
/// `scan_key_map[k]` lists the query terms that evaluate scan key `k`.
/// With a wildcard path every bound also checks the stored path.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScanMeta {
    pub num_paths: usize,
    pub has_wildcard: bool,
    pub scan_key_map: Vec<Vec<usize>>,
    pub truncation_term_index: Option<usize>,
}

impl ScanMeta {
    #[must_use]
    pub fn num_scan_keys(&self) -> usize {
        self.scan_key_map.len()
    }
}

///
/// ScanState
///
/// State of one query term's scan. Cloning is cheap: bounds and meta are
/// shared.
///

#[derive(Clone, Debug)]
pub struct ScanState {
    pub strategy: QueryStrategy,
    pub flags: ScanFlags,
    pub bounds: Arc<[IndexBounds]>,
    pub meta: Arc<ScanMeta>,
}

impl ScanState {
    #[must_use]
    pub fn new(
        strategy: QueryStrategy,
        flags: ScanFlags,
        bounds: Arc<[IndexBounds]>,
        meta: Arc<ScanMeta>,
    ) -> Self {
        Self {
            strategy,
            flags,
            bounds,
            meta,
        }
    }

    #[must_use]
    pub fn num_paths(&self) -> usize {
        self.meta.num_paths
    }
}

///
/// QueryExtraction
///
/// Query terms in scan order, one scan state per permutation. A trailing
/// truncation sentinel term, when present, has no scan state.
///

#[derive(Clone, Debug, Default)]
pub struct QueryExtraction {
    pub terms: Vec<SerializedTerm>,
    pub partial_match: Vec<bool>,
    pub scan_states: Vec<ScanState>,
    pub total_permutations: usize,
}

impl QueryExtraction {
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// No document can match.
    #[must_use]
    pub const fn is_unsatisfiable(&self) -> bool {
        self.total_permutations == 0
    }
}
