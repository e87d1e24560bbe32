use crate::value::{Decimal128, Value};
use std::cmp::Ordering;

///
/// ValueComparison
///
/// Result of a total-order comparison. `is_valid` is false when a decimal
/// NaN was compared against a non-NaN number; the ordering still places
/// NaN below every other number.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ValueComparison {
    pub ordering: Ordering,
    pub is_valid: bool,
}

impl ValueComparison {
    const fn valid(ordering: Ordering) -> Self {
        Self {
            ordering,
            is_valid: true,
        }
    }

    #[must_use]
    pub const fn is_eq(self) -> bool {
        matches!(self.ordering, Ordering::Equal)
    }

    #[must_use]
    pub const fn is_lt(self) -> bool {
        matches!(self.ordering, Ordering::Less)
    }

    #[must_use]
    pub const fn is_gt(self) -> bool {
        matches!(self.ordering, Ordering::Greater)
    }
}

/// Total comparator over values and types.
///
/// Ordering rules:
/// 1. Canonical type rank
/// 2. Type-specific comparison for same-ranked values
#[must_use]
pub fn compare_values(left: &Value, right: &Value) -> ValueComparison {
    let rank = left.canonical_rank().cmp(&right.canonical_rank());
    if rank != Ordering::Equal {
        return ValueComparison::valid(rank);
    }

    compare_same_rank(left, right)
}

/// Semantic equality under [`compare_values`] (`1 == 1.0`).
#[must_use]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    compare_values(left, right).is_eq()
}

fn compare_same_rank(left: &Value, right: &Value) -> ValueComparison {
    #[allow(clippy::match_same_arms)]
    let ordering = match (left, right) {
        _ if left.is_number() => return compare_numbers(left, right),
        (Value::Text(a) | Value::Symbol(a), Value::Text(b) | Value::Symbol(b)) => {
            a.as_bytes().cmp(b.as_bytes())
        }
        (Value::Document(a), Value::Document(b)) => return compare_documents(a, b),
        (Value::Array(a), Value::Array(b)) => return compare_arrays(a, b),
        (
            Value::Binary {
                subtype: sa,
                bytes: ba,
            },
            Value::Binary {
                subtype: sb,
                bytes: bb,
            },
        ) => ba
            .len()
            .cmp(&bb.len())
            .then(sa.cmp(sb))
            .then_with(|| ba.cmp(bb)),
        (Value::ObjectId(a), Value::ObjectId(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
        (
            Value::Timestamp {
                time: ta,
                increment: ia,
            },
            Value::Timestamp {
                time: tb,
                increment: ib,
            },
        ) => ta.cmp(tb).then(ia.cmp(ib)),
        (
            Value::Regex {
                pattern: pa,
                options: oa,
            },
            Value::Regex {
                pattern: pb,
                options: ob,
            },
        ) => pa.as_bytes().cmp(pb.as_bytes()).then_with(|| oa.cmp(ob)),
        (
            Value::DbPointer {
                namespace: na,
                id: ia,
            },
            Value::DbPointer {
                namespace: nb,
                id: ib,
            },
        ) => na
            .len()
            .cmp(&nb.len())
            .then_with(|| na.as_bytes().cmp(nb.as_bytes()))
            .then_with(|| ia.cmp(ib)),
        (Value::Code(a), Value::Code(b)) => a.as_bytes().cmp(b.as_bytes()),
        (
            Value::CodeWithScope {
                code: ca,
                scope: sa,
            },
            Value::CodeWithScope {
                code: cb,
                scope: sb,
            },
        ) => {
            let code = ca.as_bytes().cmp(cb.as_bytes());
            if code != Ordering::Equal {
                return ValueComparison::valid(code);
            }
            return compare_documents(sa, sb);
        }
        // MinKey, MaxKey, and the null/undefined bracket hold a single value
        _ => Ordering::Equal,
    };

    ValueComparison::valid(ordering)
}

fn compare_documents(left: &[(String, Value)], right: &[(String, Value)]) -> ValueComparison {
    let mut is_valid = true;
    for ((left_key, left_value), (right_key, right_value)) in left.iter().zip(right.iter()) {
        let rank = left_value.canonical_rank().cmp(&right_value.canonical_rank());
        if rank != Ordering::Equal {
            return ValueComparison {
                ordering: rank,
                is_valid,
            };
        }

        let key = left_key.as_bytes().cmp(right_key.as_bytes());
        if key != Ordering::Equal {
            return ValueComparison {
                ordering: key,
                is_valid,
            };
        }

        let cmp = compare_same_rank(left_value, right_value);
        is_valid &= cmp.is_valid;
        if cmp.ordering != Ordering::Equal {
            return ValueComparison {
                ordering: cmp.ordering,
                is_valid,
            };
        }
    }

    ValueComparison {
        ordering: left.len().cmp(&right.len()),
        is_valid,
    }
}

fn compare_arrays(left: &[Value], right: &[Value]) -> ValueComparison {
    let mut is_valid = true;
    for (left, right) in left.iter().zip(right.iter()) {
        let cmp = compare_values(left, right);
        is_valid &= cmp.is_valid;
        if cmp.ordering != Ordering::Equal {
            return ValueComparison {
                ordering: cmp.ordering,
                is_valid,
            };
        }
    }

    ValueComparison {
        ordering: left.len().cmp(&right.len()),
        is_valid,
    }
}

/// Exact cross-type numeric comparison.
fn compare_numbers(left: &Value, right: &Value) -> ValueComparison {
    let ordering = match (left, right) {
        (Value::Decimal128(a), Value::Decimal128(b)) => {
            return ValueComparison {
                ordering: a.compare(b),
                is_valid: a.is_nan() == b.is_nan(),
            };
        }
        (Value::Decimal128(a), other) | (other, Value::Decimal128(a)) => {
            let b = other.as_decimal().unwrap_or(Decimal128::NAN);
            let mut ordering = a.compare(&b);
            if matches!(right, Value::Decimal128(_)) && !matches!(left, Value::Decimal128(_)) {
                ordering = ordering.reverse();
            }
            return ValueComparison {
                ordering,
                is_valid: a.is_nan() == b.is_nan(),
            };
        }
        (Value::Double(a), Value::Double(b)) => compare_doubles(*a, *b),
        (Value::Double(a), other) => compare_int_double(int_of(other), *a).reverse(),
        (other, Value::Double(b)) => compare_int_double(int_of(other), *b),
        (a, b) => int_of(a).cmp(&int_of(b)),
    };

    ValueComparison::valid(ordering)
}

fn int_of(value: &Value) -> i64 {
    match value {
        Value::Int32(v) => i64::from(*v),
        Value::Int64(v) => *v,
        _ => 0,
    }
}

fn compare_doubles(left: f64, right: f64) -> Ordering {
    match (left.is_nan(), right.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
    }
}

fn compare_int_double(int: i64, double: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

    if double.is_nan() {
        return Ordering::Greater;
    }
    if double >= TWO_POW_63 {
        return Ordering::Less;
    }
    if double < -TWO_POW_63 {
        return Ordering::Greater;
    }

    let floor = double.floor();
    match int.cmp(&(floor as i64)) {
        Ordering::Equal if double > floor => Ordering::Less,
        other => other,
    }
}
