//! Module: ordering
//! Responsibility: project stored composite terms into sort keys for
//! ORDER BY and index-only scans.
//! Does not own: scan termination for ordered scans (see `scan`).

use crate::{
    composite::CompositeTerm,
    error::{ErrorClass, ErrorOrigin, InternalError},
    options::IndexOptions,
    term::TermError,
    value::{Value, compare_values},
};
use std::cmp::Ordering;
use thiserror::Error as ThisError;

const TRUNCATED_KEY: &str = "t";
const REVERSE_KEY: &str = "r";

///
/// OrderingError
///

#[derive(Debug, ThisError)]
pub enum OrderingError {
    #[error("Order by path '{0}' does not match any index path")]
    UnknownPath(String),

    #[error(
        "Number of terms in the index term ({terms}) does not match the number of index paths ({paths})"
    )]
    PathCountMismatch { terms: usize, paths: usize },

    #[error(transparent)]
    Term(#[from] TermError),
}

impl OrderingError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownPath(_) => ErrorClass::Internal,
            Self::PathCountMismatch { .. } => ErrorClass::Integrity,
            Self::Term(inner) => inner.class(),
        }
    }
}

impl From<OrderingError> for InternalError {
    fn from(err: OrderingError) -> Self {
        Self::new(err.class(), ErrorOrigin::Scan, err.to_string())
    }
}

/// Sort key of a stored term.
///
/// Without `order_path` the whole entry is rebuilt as
/// `{path_0: value_0, ...}` for index-only scans. With one, the key is
/// `{order_path: value}`; reverse keys also carry `"t": true` for a
/// truncated value and `"r": true`.
pub fn ordering_transform(
    term: &[u8],
    options: &IndexOptions,
    order_path: Option<&str>,
    is_reverse: bool,
) -> Result<Value, OrderingError> {
    let terms = CompositeTerm::from_stored(term)?.decode_all()?;
    if terms.len() != options.path_count() {
        return Err(OrderingError::PathCountMismatch {
            terms: terms.len(),
            paths: options.path_count(),
        });
    }

    let Some(order_path) = order_path else {
        let fields = options
            .paths
            .iter()
            .zip(terms)
            .map(|(path, term)| (path.path.clone(), term.value))
            .collect();
        return Ok(Value::Document(fields));
    };

    let index = options
        .paths
        .iter()
        .position(|p| p.path == order_path)
        .ok_or_else(|| OrderingError::UnknownPath(order_path.to_string()))?;
    let term = &terms[index];

    let mut fields = vec![(order_path.to_string(), term.value.clone())];
    if is_reverse {
        if term.is_truncated() {
            fields.push((TRUNCATED_KEY.to_string(), Value::Bool(true)));
        }
        fields.push((REVERSE_KEY.to_string(), Value::Bool(true)));
    }

    Ok(Value::Document(fields))
}

/// Order two stored terms by `order_path`.
///
/// Equal sort values break ties on truncation: a truncated value stands
/// for a longer one and sorts after. Reverse order flips the result.
pub fn compare_ordering_terms(
    left: &[u8],
    right: &[u8],
    options: &IndexOptions,
    order_path: &str,
    is_reverse: bool,
) -> Result<Ordering, OrderingError> {
    let left = ordering_transform(left, options, Some(order_path), true)?;
    let right = ordering_transform(right, options, Some(order_path), true)?;

    let ordering = match (sort_value(&left), sort_value(&right)) {
        (Some(l), Some(r)) => compare_values(l, r)
            .ordering
            .then_with(|| is_truncated_key(&left).cmp(&is_truncated_key(&right))),
        _ => Ordering::Equal,
    };

    Ok(if is_reverse { ordering.reverse() } else { ordering })
}

fn sort_value(key: &Value) -> Option<&Value> {
    match key {
        Value::Document(fields) => fields.first().map(|(_, value)| value),
        _ => None,
    }
}

fn is_truncated_key(key: &Value) -> bool {
    matches!(key.get(TRUNCATED_KEY), Some(Value::Bool(true)))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::generate_terms;

    fn stored(json: &str, options: &IndexOptions) -> Vec<u8> {
        let document = Value::parse_json(json).expect("json");
        generate_terms(&document, options, false)
            .expect("generate")
            .terms
            .remove(0)
            .into_bytes()
    }

    #[test]
    fn index_only_rebuilds_every_path() {
        let options = IndexOptions::from_paths(["a", "b"]).expect("options");
        let term = stored(r#"{"a": 1, "b": "x"}"#, &options);

        let key = ordering_transform(&term, &options, None, false).expect("transform");
        assert_eq!(
            key,
            Value::document([("a", Value::Int32(1)), ("b", Value::text("x"))])
        );
    }

    #[test]
    fn order_path_selects_one_value() {
        let options = IndexOptions::from_paths(["a", "b"]).expect("options");
        let term = stored(r#"{"a": 1, "b": "x"}"#, &options);

        let forward = ordering_transform(&term, &options, Some("b"), false).expect("transform");
        let reverse = ordering_transform(&term, &options, Some("b"), true).expect("transform");
        assert_eq!(forward, Value::document([("b", Value::text("x"))]));
        assert_eq!(
            reverse,
            Value::document([("b", Value::text("x")), ("r", Value::Bool(true))])
        );
    }

    #[test]
    fn reverse_keys_flag_truncation() {
        let options = IndexOptions::from_paths(["a"])
            .expect("options")
            .with_truncation_limit(40);
        let term = stored(&format!(r#"{{"a": "{}"}}"#, "x".repeat(100)), &options);

        let key = ordering_transform(&term, &options, Some("a"), true).expect("transform");
        assert_eq!(key.get("t"), Some(&Value::Bool(true)));
        assert_eq!(key.get("r"), Some(&Value::Bool(true)));
    }

    #[test]
    fn unknown_order_path_fails() {
        let options = IndexOptions::from_paths(["a"]).expect("options");
        let term = stored(r#"{"a": 1}"#, &options);

        let err = ordering_transform(&term, &options, Some("z"), false).expect_err("unknown");
        assert_eq!(err.to_string(), "Order by path 'z' does not match any index path");
    }

    #[test]
    fn compare_orders_by_the_selected_path() {
        let options = IndexOptions::from_paths(["a", "b"]).expect("options");
        let low = stored(r#"{"a": 9, "b": 1}"#, &options);
        let high = stored(r#"{"a": 1, "b": 2}"#, &options);

        let forward = compare_ordering_terms(&low, &high, &options, "b", false).expect("compare");
        let reverse = compare_ordering_terms(&low, &high, &options, "b", true).expect("compare");
        assert_eq!(forward, Ordering::Less);
        assert_eq!(reverse, Ordering::Greater);
    }

    #[test]
    fn path_count_must_match() {
        let options = IndexOptions::from_paths(["a", "b"]).expect("options");
        let single = stored(r#"{"a": 1}"#, &IndexOptions::from_paths(["a"]).expect("options"));

        let err = ordering_transform(&single, &options, None, false).expect_err("mismatch");
        assert_eq!(InternalError::from(err).class, ErrorClass::Integrity);
    }
}
