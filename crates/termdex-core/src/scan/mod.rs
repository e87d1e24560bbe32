//! Module: scan
//! Responsibility: classify stored composite terms against one query
//! permutation while the host walks the index in sort order.
//! Does not own: bound construction or per-document consistency.
//! Boundary: pure over (candidate bytes, scan state); never mutates state.

mod skip;


use crate::{
    composite::CompositeTerm,
    error::{ErrorClass, ErrorOrigin, InternalError},
    obs::sink::{self, DecisionKind, MetricsEvent},
    query::{IndexBounds, QueryStrategy, ScanState, SingleBound, is_valid_recheck_for_index_value},
    term::{CORRELATED_ROOT_ARRAY_KIND, IndexTerm, TermError, is_serialized_metadata},
    value::{Value, compare_values},
};
use thiserror::Error as ThisError;
use tracing::trace;

pub use skip::skip_transform;

const TARGET: &str = "termdex::scan";

///
/// ScanError
///

#[derive(Debug, ThisError)]
pub enum ScanError {
    #[error(
        "Number of terms in the index term ({terms}) does not match the number of index paths ({paths})"
    )]
    PathCountMismatch { terms: usize, paths: usize },

    #[error("Composite index does not support strategy {0}")]
    UnsupportedStrategy(i32),

    #[error(transparent)]
    Term(#[from] TermError),
}

impl ScanError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::PathCountMismatch { .. } => ErrorClass::Integrity,
            Self::UnsupportedStrategy(_) => ErrorClass::Unsupported,
            Self::Term(inner) => inner.class(),
        }
    }
}

impl From<ScanError> for InternalError {
    fn from(err: ScanError) -> Self {
        Self::new(err.class(), ErrorOrigin::Scan, err.to_string())
    }
}

///
/// ScanDecision
///
/// Outcome for one candidate. The skip variants ask the host to seek with
/// [`skip_transform`] instead of stepping to the next entry.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ScanDecision {
    Continue,
    Match,
    Stop,
    /// Every entry sharing the candidate's value on the failing path can
    /// be skipped.
    SkipPastEquality,
    /// Seek straight to the failing path's bound.
    SkipToBound,
}

impl ScanDecision {
    #[must_use]
    pub const fn to_code(self) -> i32 {
        match self {
            Self::Continue => -1,
            Self::Match => 0,
            Self::Stop => 1,
            Self::SkipPastEquality => -2,
            Self::SkipToBound => -3,
        }
    }

    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Continue),
            0 => Some(Self::Match),
            1 => Some(Self::Stop),
            -2 => Some(Self::SkipPastEquality),
            -3 => Some(Self::SkipToBound),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_skip(self) -> bool {
        matches!(self, Self::SkipPastEquality | Self::SkipToBound)
    }

    /// Direction flip for backward scans. Only `Continue` and `Stop` swap;
    /// skip requests are never produced while scanning backward.
    #[must_use]
    pub(crate) const fn reversed(self) -> Self {
        match self {
            Self::Continue => Self::Stop,
            Self::Stop => Self::Continue,
            Self::Match | Self::SkipPastEquality | Self::SkipToBound => self,
        }
    }

    const fn kind(self) -> DecisionKind {
        match self {
            Self::Continue => DecisionKind::Continue,
            Self::Match => DecisionKind::Match,
            Self::Stop => DecisionKind::Stop,
            Self::SkipPastEquality | Self::SkipToBound => DecisionKind::Skip,
        }
    }
}

/// Classify `candidate` against the permutation described by `state`.
pub fn compare_partial(candidate: &[u8], state: &ScanState) -> Result<ScanDecision, ScanError> {
    let decision = decide(candidate, state)?;

    trace!(target: TARGET, code = decision.to_code(), "compare partial");
    sink::record(MetricsEvent::ScanDecision {
        kind: decision.kind(),
    });

    Ok(decision)
}

fn decide(candidate: &[u8], state: &ScanState) -> Result<ScanDecision, ScanError> {
    let composite = CompositeTerm::from_stored(candidate)?;
    let parts = composite.split();
    let first = parts.first().copied().unwrap_or_default();

    match state.strategy {
        QueryStrategy::IsMultiKey => {
            if !is_serialized_metadata(first) {
                return Ok(ScanDecision::Stop);
            }
            let term = IndexTerm::decode(first)?;
            return Ok(if term.value.is_array() {
                ScanDecision::Match
            } else {
                ScanDecision::Continue
            });
        }
        QueryStrategy::HasCorrelatedReducedTerms => {
            if !is_serialized_metadata(first) {
                return Ok(ScanDecision::Stop);
            }
            let term = IndexTerm::decode(first)?;
            return Ok(
                if matches!(term.value, Value::Int32(CORRELATED_ROOT_ARRAY_KIND)) {
                    ScanDecision::Match
                } else {
                    ScanDecision::Continue
                },
            );
        }
        QueryStrategy::HasTruncatedTerms => {
            let term = IndexTerm::decode(first)?;
            return Ok(if term.is_root_truncation_term() {
                ScanDecision::Match
            } else if !term.path.is_empty() {
                ScanDecision::Stop
            } else {
                ScanDecision::Continue
            });
        }
        QueryStrategy::OrderBy | QueryStrategy::OrderByReverse => {
            // a truncated sort key cannot end the ordered prefix
            return Ok(if composite.is_truncated() {
                ScanDecision::Continue
            } else {
                ScanDecision::Stop
            });
        }
        QueryStrategy::CompositeQuery | QueryStrategy::UniqueEqual => {}
        other => return Err(ScanError::UnsupportedStrategy(other.code())),
    }

    if state.flags.is_backward && parts.len() == 1 {
        let term = IndexTerm::decode(first)?;
        if term.is_metadata() || term.is_root_truncation_term() {
            return Ok(ScanDecision::Stop);
        }
    }

    check_path_count(parts.len(), state)?;

    let mut walk = BoundsWalk::new(state);
    for (bounds, part) in state.bounds.iter().zip(parts) {
        if bounds.is_unbounded() {
            walk.prior_matches_equality = false;
            walk.has_unspecified_prefix = true;
            continue;
        }

        let term = IndexTerm::decode(part)?;
        let decision = walk.compare(bounds, &term);
        if decision != ScanDecision::Match {
            return Ok(decision);
        }

        if !bounds
            .rechecks
            .iter()
            .all(|recheck| is_valid_recheck_for_index_value(&term, recheck))
        {
            return Ok(ScanDecision::Continue);
        }
    }

    Ok(ScanDecision::Match)
}

pub(crate) fn check_path_count(terms: usize, state: &ScanState) -> Result<(), ScanError> {
    if terms == state.num_paths() {
        Ok(())
    } else {
        Err(ScanError::PathCountMismatch {
            terms,
            paths: state.num_paths(),
        })
    }
}

///
/// BoundsWalk
///
/// Prefix tracking across the paths of one candidate, left to right.
///

pub(crate) struct BoundsWalk {
    is_backward: bool,
    has_wildcard: bool,
    prior_matches_equality: bool,
    has_equality_prefix: bool,
    has_unspecified_prefix: bool,
}

impl BoundsWalk {
    pub(crate) fn new(state: &ScanState) -> Self {
        Self {
            is_backward: state.flags.is_backward,
            has_wildcard: state.meta.has_wildcard,
            prior_matches_equality: true,
            has_equality_prefix: true,
            has_unspecified_prefix: false,
        }
    }

    /// Compare one path's sub-term with its bounds. `Match` means in range.
    pub(crate) fn compare(&mut self, bounds: &IndexBounds, term: &IndexTerm) -> ScanDecision {
        self.has_equality_prefix &= self.prior_matches_equality;

        if bounds.is_equality {
            return self.compare_equality(bounds, term);
        }

        self.prior_matches_equality = false;
        if let Some(lower) = &bounds.lower {
            let cmp = compare_values(&term.value, lower.indexed_value());
            if !cmp.is_valid {
                return ScanDecision::Continue;
            }
            if cmp.is_lt() {
                return self.below(term);
            }
            if cmp.is_eq() && !lower.is_inclusive && !lower.is_truncated() {
                return ScanDecision::Continue;
            }
            if self.has_wildcard && !path_matches(term, lower, Value::MinKey) {
                return self.below(term);
            }
        }

        if let Some(upper) = &bounds.upper {
            let cmp = compare_values(&term.value, upper.indexed_value());
            if !cmp.is_valid {
                return ScanDecision::Continue;
            }
            if cmp.is_gt() {
                return self.above(term);
            }
            if cmp.is_eq() && !upper.is_inclusive && !upper.is_truncated() {
                return ScanDecision::Continue;
            }
            if self.has_wildcard && !path_matches(term, upper, Value::MaxKey) {
                return self.above(term);
            }
        }

        if bounds.lower.is_none() && bounds.upper.is_none() {
            self.has_unspecified_prefix = true;
        }

        ScanDecision::Match
    }

    fn compare_equality(&self, bounds: &IndexBounds, term: &IndexTerm) -> ScanDecision {
        let Some(point) = &bounds.lower else {
            return ScanDecision::Match;
        };

        let cmp = compare_values(&term.value, point.indexed_value());
        if cmp.is_lt() {
            return self.below(term);
        }
        if cmp.is_gt() {
            return self.above(term);
        }
        if self.has_wildcard && term.path != point.indexed_path() {
            return self.above(term);
        }

        ScanDecision::Match
    }

    // Candidate sorts before the bound on this path.
    fn below(&self, term: &IndexTerm) -> ScanDecision {
        let skip_forward = self.has_unspecified_prefix && !self.is_backward;
        let decision = if term.is_descending() {
            if self.has_equality_prefix {
                ScanDecision::Stop
            } else if skip_forward {
                ScanDecision::SkipPastEquality
            } else {
                ScanDecision::Continue
            }
        } else if skip_forward {
            ScanDecision::SkipToBound
        } else {
            ScanDecision::Continue
        };

        if self.is_backward {
            decision.reversed()
        } else {
            decision
        }
    }

    // Candidate sorts after the bound on this path.
    fn above(&self, term: &IndexTerm) -> ScanDecision {
        let skip_forward = self.has_unspecified_prefix && !self.is_backward;
        let decision = if term.is_descending() {
            if skip_forward {
                ScanDecision::SkipToBound
            } else {
                ScanDecision::Continue
            }
        } else if self.has_equality_prefix {
            ScanDecision::Stop
        } else if skip_forward {
            ScanDecision::SkipPastEquality
        } else {
            ScanDecision::Continue
        };

        if !self.is_backward {
            return decision;
        }

        match decision.reversed() {
            ScanDecision::Stop if !self.has_equality_prefix => ScanDecision::Continue,
            other => other,
        }
    }
}

// Stored path check for wildcard indexes. A sentinel endpoint stands for
// an existence check and accepts any subpath of the bound path.
fn path_matches(term: &IndexTerm, bound: &SingleBound, sentinel: Value) -> bool {
    let bound_path = bound.indexed_path();
    if *bound.indexed_value() == sentinel {
        is_subpath(&term.path, bound_path)
    } else {
        term.path == bound_path
    }
}

fn is_subpath(path: &str, parent: &str) -> bool {
    path.strip_prefix(parent)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}
