use crate::{
    query::recheck::RecheckKind,
    term::{IndexTerm, SerializedTerm, TermCreateMetadata, TermError, serialize_term},
    value::{Document, Value, ValueTag, compare_values},
};
use std::{cmp::Ordering, sync::Arc};

/// Stored path of a non-wildcard bound term.
pub(crate) const BOUND_PATH: &str = "$";

///
/// BoundTerm
///
/// Encoded form of a bound endpoint, cached so scans never re-encode.
///

#[derive(Clone, Debug, PartialEq)]
pub struct BoundTerm {
    pub serialized: SerializedTerm,
    pub decoded: IndexTerm,
}

///
/// SingleBound
///

#[derive(Clone, Debug, PartialEq)]
pub struct SingleBound {
    pub value: Value,
    pub is_inclusive: bool,
    pub term: Option<BoundTerm>,
}

impl SingleBound {
    #[must_use]
    pub const fn new(value: Value, is_inclusive: bool) -> Self {
        Self {
            value,
            is_inclusive,
            term: None,
        }
    }

    #[must_use]
    pub const fn inclusive(value: Value) -> Self {
        Self::new(value, true)
    }

    #[must_use]
    pub const fn exclusive(value: Value) -> Self {
        Self::new(value, false)
    }

    /// Value as stored in the index, possibly truncated.
    #[must_use]
    pub fn indexed_value(&self) -> &Value {
        self.term.as_ref().map_or(&self.value, |t| &t.decoded.value)
    }

    #[must_use]
    pub fn indexed_path(&self) -> &str {
        self.term
            .as_ref()
            .map_or(BOUND_PATH, |t| t.decoded.path.as_str())
    }

    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.term.as_ref().is_some_and(|t| t.decoded.is_truncated())
    }

    /// Encode the endpoint at `path`; returns whether it was truncated.
    pub(crate) fn prepare(
        &mut self,
        path: &str,
        metadata: &TermCreateMetadata,
    ) -> Result<bool, TermError> {
        let serialized = serialize_term(path, &self.value, metadata)?;
        let decoded = IndexTerm::decode(serialized.as_bytes())?;
        let is_truncated = decoded.is_truncated();
        self.term = Some(BoundTerm {
            serialized,
            decoded,
        });

        Ok(is_truncated)
    }
}

/// Tighten a lower bound: the larger value wins, equal values AND their
/// inclusivity.
pub fn set_lower_bound(current: &mut Option<SingleBound>, incoming: &SingleBound) {
    tighten(current, incoming, Ordering::Less);
}

/// Tighten an upper bound: the smaller value wins, equal values AND their
/// inclusivity.
pub fn set_upper_bound(current: &mut Option<SingleBound>, incoming: &SingleBound) {
    tighten(current, incoming, Ordering::Greater);
}

fn tighten(current: &mut Option<SingleBound>, incoming: &SingleBound, replace_when: Ordering) {
    match current {
        None => *current = Some(incoming.clone()),
        Some(existing) => match compare_values(&existing.value, &incoming.value).ordering {
            Ordering::Equal => {
                existing.is_inclusive = existing.is_inclusive && incoming.is_inclusive;
            }
            ordering if ordering == replace_when => *existing = incoming.clone(),
            _ => {}
        },
    }
}

///
/// IndexBounds
///
/// Bounds one query fragment places on a single indexed path.
/// `query_path` is set only for bounds on the wildcard path.
///

#[derive(Clone, Debug, Default)]
pub struct IndexBounds {
    pub lower: Option<SingleBound>,
    pub upper: Option<SingleBound>,
    pub is_equality: bool,
    pub rechecks: Vec<Arc<RecheckKind>>,
    pub requires_recheck: bool,
    pub query_path: Option<String>,
}

impl IndexBounds {
    pub fn set_lower(&mut self, bound: &SingleBound) {
        set_lower_bound(&mut self.lower, bound);
    }

    pub fn set_upper(&mut self, bound: &SingleBound) {
        set_upper_bound(&mut self.upper, bound);
    }

    pub fn add_recheck(&mut self, recheck: RecheckKind) {
        self.rechecks.push(Arc::new(recheck));
    }

    /// Fold another fragment's bounds into these.
    pub fn merge(&mut self, other: &Self) {
        if let Some(lower) = &other.lower {
            self.set_lower(lower);
        }
        if let Some(upper) = &other.upper {
            self.set_upper(upper);
        }
        self.rechecks.extend(other.rechecks.iter().cloned());
        self.requires_recheck |= other.requires_recheck;
        if self.query_path.is_none() {
            self.query_path.clone_from(&other.query_path);
        }
    }

    /// No bounds and no rechecks: every value matches.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none() && self.rechecks.is_empty()
    }

    /// Both endpoints inclusive and equal.
    #[must_use]
    pub fn is_point(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => {
                lower.is_inclusive
                    && upper.is_inclusive
                    && compare_values(&lower.value, &upper.value).is_eq()
            }
            _ => false,
        }
    }
}

///
/// BoundsSet
///
/// Alternative bounds for one path; a match on any one satisfies the
/// fragment. An empty set is unsatisfiable.
///

#[derive(Clone, Debug, Default)]
pub struct BoundsSet {
    pub path_index: usize,
    pub bounds: Vec<IndexBounds>,
}

impl BoundsSet {
    #[must_use]
    pub const fn new(path_index: usize, bounds: Vec<IndexBounds>) -> Self {
        Self { path_index, bounds }
    }

    #[must_use]
    pub fn single(path_index: usize, bounds: IndexBounds) -> Self {
        Self::new(path_index, vec![bounds])
    }

    #[must_use]
    pub fn is_single_equality(&self) -> bool {
        self.bounds.len() == 1 && self.bounds[0].is_point()
    }
}

/// Smallest value sorting in the bracket of `tag`.
#[must_use]
pub fn type_lower_bound(tag: ValueTag) -> SingleBound {
    let value = match tag {
        ValueTag::MinKey => Value::MinKey,
        ValueTag::Undefined | ValueTag::Null => Value::Null,
        ValueTag::Double | ValueTag::Int32 | ValueTag::Int64 | ValueTag::Decimal128 => {
            Value::Double(f64::NEG_INFINITY)
        }
        ValueTag::Text | ValueTag::Symbol => Value::text(""),
        ValueTag::Document => Value::Document(Document::new()),
        ValueTag::Array => Value::Array(Vec::new()),
        ValueTag::Binary => Value::Binary {
            subtype: 0,
            bytes: Vec::new(),
        },
        ValueTag::ObjectId => Value::ObjectId([0; 12]),
        ValueTag::Bool => Value::Bool(false),
        ValueTag::DateTime => Value::DateTime(i64::MIN),
        ValueTag::Timestamp => Value::Timestamp {
            time: 0,
            increment: 0,
        },
        ValueTag::Regex => Value::Regex {
            pattern: String::new(),
            options: String::new(),
        },
        ValueTag::DbPointer => Value::DbPointer {
            namespace: String::new(),
            id: [0; 12],
        },
        ValueTag::Code => Value::Code(String::new()),
        ValueTag::CodeWithScope => Value::CodeWithScope {
            code: String::new(),
            scope: Document::new(),
        },
        ValueTag::MaxKey => Value::MaxKey,
    };

    SingleBound::inclusive(value)
}

/// Largest value sorting in the bracket of `tag`. Brackets without a
/// largest member end exclusively at the next bracket's lower bound.
#[must_use]
pub fn type_upper_bound(tag: ValueTag) -> SingleBound {
    let next = |tag| SingleBound::exclusive(type_lower_bound(tag).value);

    match tag {
        ValueTag::MinKey => SingleBound::inclusive(Value::MinKey),
        ValueTag::Undefined | ValueTag::Null => SingleBound::inclusive(Value::Null),
        ValueTag::Double | ValueTag::Int32 | ValueTag::Int64 | ValueTag::Decimal128 => {
            SingleBound::inclusive(Value::Double(f64::INFINITY))
        }
        ValueTag::Text | ValueTag::Symbol => next(ValueTag::Document),
        ValueTag::Document => next(ValueTag::Array),
        ValueTag::Array => next(ValueTag::Binary),
        ValueTag::Binary => next(ValueTag::ObjectId),
        ValueTag::ObjectId => next(ValueTag::Bool),
        ValueTag::Bool => SingleBound::inclusive(Value::Bool(true)),
        ValueTag::DateTime => SingleBound::inclusive(Value::DateTime(i64::MAX)),
        ValueTag::Timestamp => SingleBound::inclusive(Value::Timestamp {
            time: u32::MAX,
            increment: u32::MAX,
        }),
        ValueTag::Regex => next(ValueTag::DbPointer),
        ValueTag::DbPointer => next(ValueTag::Code),
        ValueTag::Code => next(ValueTag::CodeWithScope),
        ValueTag::CodeWithScope => next(ValueTag::MaxKey),
        ValueTag::MaxKey => SingleBound::inclusive(Value::MaxKey),
    }
}

///
/// TESTS
///
