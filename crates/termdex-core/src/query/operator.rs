use crate::{
    options::IndexOptions,
    query::{
        QueryError, QueryStrategy,
        bounds::{BoundsSet, IndexBounds, SingleBound, type_lower_bound, type_upper_bound},
        recheck::{BitsOp, RecheckKind},
    },
    value::{Value, ValueTag, compare_values},
};

/// Append the bound sets one `{path: value}` predicate places on its
/// indexed path.
pub(crate) fn parse_operator_strategy(
    options: &IndexOptions,
    path: &str,
    value: &Value,
    strategy: QueryStrategy,
    sets: &mut Vec<BoundsSet>,
) -> Result<(), QueryError> {
    let index = options
        .find_query_path(path)
        .ok_or_else(|| QueryError::PathNotIndexed(path.to_string()))?;

    let mut added = match strategy {
        QueryStrategy::Equal => {
            let bounds = if value.is_array() {
                array_equality(value).to_vec()
            } else {
                vec![equality(value)]
            };
            vec![BoundsSet::new(index, bounds)]
        }
        QueryStrategy::GreaterThan | QueryStrategy::GreaterThanEqual => {
            let inclusive = strategy == QueryStrategy::GreaterThanEqual;
            vec![BoundsSet::single(index, greater_than(value, inclusive))]
        }
        QueryStrategy::LessThan | QueryStrategy::LessThanEqual => {
            let inclusive = strategy == QueryStrategy::LessThanEqual;
            vec![BoundsSet::single(index, less_than(value, inclusive))]
        }
        QueryStrategy::Exists => {
            let bounds = if value.as_i64_lossy() == Some(1) {
                exists_true()
            } else {
                let mut bounds = IndexBounds::default();
                bounds.set_lower(&SingleBound::exclusive(Value::MinKey));
                bounds.set_upper(&SingleBound::inclusive(Value::Null));
                bounds.add_recheck(RecheckKind::Exists { exists: false });
                bounds
            };
            vec![BoundsSet::single(index, bounds)]
        }
        QueryStrategy::ElemMatch => {
            let mut bounds = exists_true();
            bounds.requires_recheck = true;
            vec![BoundsSet::single(index, bounds)]
        }
        QueryStrategy::Size => {
            // array length is not indexed
            let mut bounds = if value.as_i64_lossy() == Some(0) {
                equality(&Value::Null)
            } else {
                exists_true()
            };
            bounds.requires_recheck = true;
            vec![BoundsSet::single(index, bounds)]
        }
        QueryStrategy::Mod => {
            let mut bounds = type_range(ValueTag::Double);
            bounds.add_recheck(RecheckKind::modulo(value)?);
            vec![BoundsSet::single(index, bounds)]
        }
        QueryStrategy::NotEqual => vec![BoundsSet::single(index, not_equal(value))],
        QueryStrategy::Regex => {
            let bounds = if matches!(value, Value::Regex { .. }) {
                regex_pair(value, false)?.to_vec()
            } else {
                vec![regex_single(value, false)?]
            };
            vec![BoundsSet::new(index, bounds)]
        }
        QueryStrategy::Range => range(index, value)?,
        QueryStrategy::Type => {
            let bounds = match value {
                Value::Array(types) => types.iter().map(type_bounds).collect::<Result<_, _>>()?,
                _ => vec![type_bounds(value)?],
            };
            vec![BoundsSet::new(index, bounds)]
        }
        QueryStrategy::In => vec![BoundsSet::new(index, dollar_in(value)?)],
        QueryStrategy::NotIn => vec![BoundsSet::new(index, dollar_not_in(value)?)],
        QueryStrategy::BitsAllClear => vec![bits(index, BitsOp::AllClear, value)?],
        QueryStrategy::BitsAnyClear => vec![bits(index, BitsOp::AnyClear, value)?],
        QueryStrategy::BitsAllSet => vec![bits(index, BitsOp::AllSet, value)?],
        QueryStrategy::BitsAnySet => vec![bits(index, BitsOp::AnySet, value)?],
        QueryStrategy::NotGreater => vec![not_greater(index, value, false)],
        QueryStrategy::NotGreaterEqual => vec![not_greater(index, value, true)],
        QueryStrategy::NotLess => vec![not_less(index, value, false)],
        QueryStrategy::NotLessEqual => vec![not_less(index, value, true)],
        QueryStrategy::OrderBy | QueryStrategy::OrderByReverse => Vec::new(),
        QueryStrategy::CompositeQuery
        | QueryStrategy::UniqueEqual
        | QueryStrategy::IsMultiKey
        | QueryStrategy::HasTruncatedTerms
        | QueryStrategy::HasCorrelatedReducedTerms => {
            return Err(QueryError::UnsupportedStrategy(strategy.code()));
        }
    };

    if options.paths[index].is_wildcard {
        for bounds in added.iter_mut().flat_map(|set| set.bounds.iter_mut()) {
            bounds.query_path = Some(path.to_string());
        }
    }
    sets.append(&mut added);

    Ok(())
}

/// `[MinKey, MaxKey]` with an existence recheck.
fn exists_true() -> IndexBounds {
    let mut bounds = IndexBounds::default();
    bounds.set_lower(&SingleBound::inclusive(Value::MinKey));
    bounds.set_upper(&SingleBound::inclusive(Value::MaxKey));
    bounds.add_recheck(RecheckKind::Exists { exists: true });

    bounds
}

fn type_range(tag: ValueTag) -> IndexBounds {
    let mut bounds = IndexBounds::default();
    bounds.set_lower(&type_lower_bound(tag));
    bounds.set_upper(&type_upper_bound(tag));

    bounds
}

fn first_element(array: &Value) -> Option<&Value> {
    match array {
        Value::Array(items) => items.first(),
        _ => None,
    }
}

// Null also matches missing values, which sort between MinKey and null.
fn equality(value: &Value) -> IndexBounds {
    let mut bounds = IndexBounds::default();
    let point = SingleBound::inclusive(value.clone());

    if value.is_null() {
        bounds.set_lower(&SingleBound::exclusive(Value::MinKey));
        bounds.requires_recheck = true;
    } else {
        bounds.set_lower(&point);
    }
    bounds.set_upper(&point);

    bounds
}

// Top-level arrays are not indexed as a whole, so match either a nested
// array equal to the value or the first element.
fn array_equality(value: &Value) -> [IndexBounds; 2] {
    let first = first_element(value).cloned().unwrap_or(Value::Null);
    let mut by_first = equality(&first);
    by_first.requires_recheck = true;

    [equality(value), by_first]
}

fn greater_than(value: &Value, inclusive: bool) -> IndexBounds {
    let mut bounds = IndexBounds::default();
    let mut inclusive = inclusive;

    if matches!(value, Value::MinKey) {
        // an array starting with MinKey still matches `$gt: MinKey`
        let mut bounds = exists_true();
        bounds.requires_recheck = !inclusive;
        return bounds;
    }

    let mut compare_value = value.clone();
    let skip_type_bracketing = value.is_array();
    if skip_type_bracketing {
        bounds.requires_recheck = true;
        let first = first_element(value).cloned().unwrap_or(Value::MinKey);
        if compare_values(value, &first).is_gt() {
            compare_value = first;
            inclusive = true;
        }
    }

    let lower = if compare_value.is_null() && inclusive && !skip_type_bracketing {
        SingleBound::exclusive(Value::MinKey)
    } else {
        SingleBound::new(compare_value.clone(), inclusive)
    };
    bounds.set_lower(&lower);

    if matches!(compare_value, Value::MinKey) || skip_type_bracketing {
        bounds.set_upper(&type_upper_bound(ValueTag::MaxKey));
    } else if value.is_nan() {
        bounds.set_upper(&lower);
    } else {
        bounds.set_upper(&type_upper_bound(value.tag()));
    }

    if value.is_null() {
        bounds.requires_recheck = true;
    }

    bounds
}

fn less_than(value: &Value, inclusive: bool) -> IndexBounds {
    let mut bounds = IndexBounds::default();
    let mut inclusive = inclusive;

    let mut compare_value = value.clone();
    let skip_type_bracketing = value.is_array();
    if skip_type_bracketing {
        bounds.requires_recheck = true;
        let first = first_element(value).cloned().unwrap_or(Value::Null);
        if compare_values(value, &first).is_lt() {
            compare_value = first;
            inclusive = true;
        }
    }

    if matches!(compare_value, Value::MaxKey) && !inclusive {
        // only literal MaxKey is excluded
        let mut bounds = exists_true();
        bounds.requires_recheck = true;
        return bounds;
    }

    let upper = SingleBound::new(compare_value.clone(), inclusive);
    bounds.set_upper(&upper);

    if matches!(compare_value, Value::MaxKey) || skip_type_bracketing {
        bounds.set_lower(&type_lower_bound(ValueTag::MinKey));
    } else if compare_value.is_nan() {
        bounds.set_lower(&upper);
    } else if compare_value.is_null() && inclusive {
        bounds.set_lower(&SingleBound::exclusive(Value::MinKey));
    } else {
        bounds.set_lower(&type_lower_bound(compare_value.tag()));
    }

    if compare_value.is_null() {
        bounds.requires_recheck = true;
    }

    bounds
}

// `a: [1, 2, 3]` still satisfies `a != 2` through another element.
fn not_equal(value: &Value) -> IndexBounds {
    let mut bounds = IndexBounds::default();
    bounds.set_lower(&type_lower_bound(ValueTag::MinKey));
    bounds.set_upper(&type_upper_bound(ValueTag::MaxKey));
    bounds.add_recheck(RecheckKind::NotEqual {
        value: value.clone(),
    });
    bounds.requires_recheck = true;

    bounds
}

fn regex_single(value: &Value, is_negation: bool) -> Result<IndexBounds, QueryError> {
    let (lower, upper) = if is_negation {
        (ValueTag::MinKey, ValueTag::MaxKey)
    } else {
        (ValueTag::Text, ValueTag::Text)
    };

    let mut bounds = IndexBounds::default();
    bounds.set_lower(&type_lower_bound(lower));
    bounds.set_upper(&type_upper_bound(upper));
    bounds.add_recheck(RecheckKind::regex(value, is_negation)?);

    Ok(bounds)
}

// Text matching the pattern, plus stored regex values equal to it.
fn regex_pair(value: &Value, is_negation: bool) -> Result<[IndexBounds; 2], QueryError> {
    let mut by_pattern = regex_single(value, is_negation)?;
    by_pattern.requires_recheck = is_negation;

    let mut by_value = IndexBounds::default();
    let point = SingleBound::inclusive(value.clone());
    by_value.set_lower(&point);
    by_value.set_upper(&point);
    by_value.requires_recheck = is_negation;

    Ok([by_pattern, by_value])
}

fn type_bounds(value: &Value) -> Result<IndexBounds, QueryError> {
    let tag = match value {
        Value::Text(name) => ValueTag::from_label(name)
            .ok_or_else(|| QueryError::InvalidOperand(format!("Unknown type name alias: {name}")))?,
        number if number.is_number() || matches!(number, Value::Bool(_)) => {
            let code = number.as_i64_lossy().unwrap_or(i64::MIN);
            ValueTag::from_type_code(code).ok_or_else(|| {
                QueryError::InvalidOperand(format!("Invalid $type specified: {code}"))
            })?
        }
        other => {
            return Err(QueryError::InvalidOperand(format!(
                "Invalid $type value for composite index: {other}"
            )));
        }
    };

    let mut bounds = if tag == ValueTag::Array {
        exists_true()
    } else {
        type_range(tag)
    };
    bounds.requires_recheck = true;

    Ok(bounds)
}

fn check_in_element(element: &Value, operator: &str) -> Result<(), QueryError> {
    let nests_operator = match element {
        Value::Document(fields) => fields.first().is_some_and(|(key, _)| key.starts_with('$')),
        _ => false,
    };
    if nests_operator {
        return Err(QueryError::InvalidOperand(format!(
            "cannot nest $ under {operator}"
        )));
    }

    Ok(())
}

fn dollar_in(value: &Value) -> Result<Vec<IndexBounds>, QueryError> {
    let Value::Array(items) = value else {
        return Err(QueryError::InvalidOperand(
            "$in must contain an array of values".to_string(),
        ));
    };

    let mut bounds = Vec::with_capacity(items.len());
    for item in items {
        check_in_element(item, "$in")?;
        match item {
            Value::Regex { .. } => bounds.extend(regex_pair(item, false)?),
            Value::Array(_) => bounds.extend(array_equality(item)),
            _ => bounds.push(equality(item)),
        }
    }

    Ok(bounds)
}

fn dollar_not_in(value: &Value) -> Result<Vec<IndexBounds>, QueryError> {
    let Value::Array(items) = value else {
        return Err(QueryError::InvalidOperand(
            "$nin should have an array of values".to_string(),
        ));
    };

    if items.is_empty() {
        return Ok(vec![exists_true()]);
    }

    let mut bounds = Vec::with_capacity(items.len());
    for item in items {
        check_in_element(item, "$nin")?;
        match item {
            Value::Regex { .. } => bounds.extend(regex_pair(item, true)?),
            _ => bounds.push(not_equal(item)),
        }
    }

    Ok(bounds)
}

// Bit tests apply to numbers and binary data only.
fn bits(index: usize, op: BitsOp, value: &Value) -> Result<BoundsSet, QueryError> {
    let recheck = RecheckKind::bits(op, value)?;

    let mut numbers = type_range(ValueTag::Double);
    numbers.add_recheck(recheck.clone());
    let mut binary = type_range(ValueTag::Binary);
    binary.add_recheck(recheck);

    Ok(BoundsSet::new(index, vec![numbers, binary]))
}

// Complement of `(value, type max]`: `[MinKey, value]` or `(type max, MaxKey]`.
fn not_greater(index: usize, value: &Value, is_equals: bool) -> BoundsSet {
    let mut below = IndexBounds::default();
    below.set_lower(&type_lower_bound(ValueTag::MinKey));
    below.set_upper(&SingleBound::new(value.clone(), !is_equals || value.is_null()));
    below.requires_recheck = true;

    let mut above = IndexBounds::default();
    let type_max = type_upper_bound(value.tag());
    above.set_lower(&SingleBound::exclusive(type_max.value));
    above.set_upper(&type_upper_bound(ValueTag::MaxKey));
    above.requires_recheck = true;

    BoundsSet::new(index, vec![below, above])
}

// Complement of `[type min, value)`: `[MinKey, type min)` or `[value, MaxKey]`.
fn not_less(index: usize, value: &Value, is_equals: bool) -> BoundsSet {
    let mut below = IndexBounds::default();
    below.set_lower(&type_lower_bound(ValueTag::MinKey));
    let type_min = type_lower_bound(value.tag());
    below.set_upper(&SingleBound::new(type_min.value, value.is_null()));
    below.requires_recheck = true;

    let mut above = IndexBounds::default();
    above.set_lower(&SingleBound::new(value.clone(), !is_equals));
    above.set_upper(&type_upper_bound(ValueTag::MaxKey));
    above.requires_recheck = true;

    BoundsSet::new(index, vec![below, above])
}

fn range(index: usize, value: &Value) -> Result<Vec<BoundsSet>, QueryError> {
    let Value::Document(fields) = value else {
        return Err(QueryError::InvalidOperand(format!(
            "$range must be a document: {value}"
        )));
    };

    let mut min = None;
    let mut max = None;
    let mut min_inclusive = false;
    let mut max_inclusive = false;
    let mut full_scan = false;
    for (key, field) in fields {
        let flag = || field.as_i64_lossy().is_some_and(|v| v != 0);
        match key.as_str() {
            "min" => min = Some(field),
            "max" => max = Some(field),
            "minInclusive" => min_inclusive = flag(),
            "maxInclusive" => max_inclusive = flag(),
            "fullScan" | "orderByScan" => full_scan |= flag(),
            other => {
                return Err(QueryError::InvalidOperand(format!(
                    "Range predicate not supported: {other}"
                )));
            }
        }
    }

    if full_scan {
        return Ok(Vec::new());
    }

    let mut sets = Vec::new();
    if let Some(min) = min {
        sets.push(BoundsSet::single(index, greater_than(min, min_inclusive)));
    }
    if let Some(max) = max {
        sets.push(BoundsSet::single(index, less_than(max, max_inclusive)));
    }

    Ok(sets)
}

///
/// TESTS
///
