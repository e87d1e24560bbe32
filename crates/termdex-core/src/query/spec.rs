use crate::{
    query::{QueryError, QueryStrategy},
    value::Value,
};

///
/// QueryPredicate
///
/// One `{path: value}` predicate with the operator applied to it.
///

#[derive(Clone, Debug, PartialEq)]
pub struct QueryPredicate {
    pub strategy: QueryStrategy,
    pub path: String,
    pub value: Value,
}

impl QueryPredicate {
    #[must_use]
    pub fn new(strategy: QueryStrategy, path: impl Into<String>, value: Value) -> Self {
        Self {
            strategy,
            path: path.into(),
            value,
        }
    }
}

///
/// CompositeQuery
///
/// Every predicate of one index scan, folded into a single query
/// document `{q: [{op, path: value}...], m, or, cr, db}`.
///
/// `is_multikey` defaults to true: without it, single-bound predicates on
/// one path are intersected instead of scanned separately.
///

#[derive(Clone, Debug, PartialEq)]
pub struct CompositeQuery {
    pub predicates: Vec<QueryPredicate>,
    pub is_multikey: bool,
    pub is_ordered: bool,
    pub is_correlated: bool,
    pub is_backward: bool,
}

impl Default for CompositeQuery {
    fn default() -> Self {
        Self {
            predicates: Vec::new(),
            is_multikey: true,
            is_ordered: false,
            is_correlated: false,
            is_backward: false,
        }
    }
}

impl CompositeQuery {
    #[must_use]
    pub fn new(predicates: Vec<QueryPredicate>) -> Self {
        Self {
            predicates,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_multikey(mut self, is_multikey: bool) -> Self {
        self.is_multikey = is_multikey;
        self
    }

    #[must_use]
    pub const fn with_ordered(mut self, is_ordered: bool) -> Self {
        self.is_ordered = is_ordered;
        self
    }

    #[must_use]
    pub const fn with_correlated(mut self, is_correlated: bool) -> Self {
        self.is_correlated = is_correlated;
        self
    }

    #[must_use]
    pub const fn with_backward(mut self, is_backward: bool) -> Self {
        self.is_backward = is_backward;
        self
    }

    /// Parse a composite query document.
    pub fn parse(query: &Value) -> Result<Self, QueryError> {
        let Value::Document(fields) = query else {
            return Err(QueryError::ExpectedDocument(query.to_string()));
        };

        let mut spec = Self::default();
        let mut predicates = None;
        for (key, value) in fields {
            match key.as_str() {
                "q" => predicates = Some(value),
                "m" => spec.is_multikey = is_truthy(value),
                "or" => spec.is_ordered |= is_truthy(value),
                "cr" => spec.is_correlated |= is_truthy(value),
                "db" => spec.is_backward = is_truthy(value),
                other => return Err(QueryError::UnknownCompositeKey(other.to_string())),
            }
        }

        spec.predicates = match predicates {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| parse_predicate(item, query))
                .collect::<Result<_, _>>()?,
            Some(other) => return Err(QueryError::ExpectedArray(other.type_name())),
            None => return Err(QueryError::ExpectedArray(Value::Undefined.type_name())),
        };

        Ok(spec)
    }

    /// Query document accepted by [`Self::parse`].
    #[must_use]
    pub fn to_value(&self) -> Value {
        let predicates = self
            .predicates
            .iter()
            .map(|p| {
                Value::document([
                    ("op".to_string(), Value::Int32(p.strategy.code())),
                    (p.path.clone(), p.value.clone()),
                ])
            })
            .collect();

        let mut fields = vec![
            ("q".to_string(), Value::Array(predicates)),
            ("m".to_string(), Value::Bool(self.is_multikey)),
            ("or".to_string(), Value::Bool(self.is_ordered)),
            ("db".to_string(), Value::Bool(self.is_backward)),
        ];
        if self.is_correlated {
            fields.push(("cr".to_string(), Value::Bool(true)));
        }

        Value::Document(fields)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        other => other.as_i64_lossy().is_some_and(|v| v != 0),
    }
}

fn parse_predicate(item: &Value, query: &Value) -> Result<QueryPredicate, QueryError> {
    let Value::Document(fields) = item else {
        return Err(QueryError::ExpectedDocument(query.to_string()));
    };

    let mut op = 0;
    let mut operand: Option<(&str, &Value)> = None;
    for (key, value) in fields {
        if key == "op" {
            op = match value {
                Value::Int32(code) => *code,
                other => other
                    .as_i64_exact()
                    .and_then(|code| i32::try_from(code).ok())
                    .unwrap_or(0),
            };
        } else {
            operand = Some((key.as_str(), value));
        }
    }

    let invalid = || QueryError::InvalidPredicate {
        op,
        value: item.to_string(),
    };
    let (path, value) = operand
        .filter(|(path, _)| !path.is_empty())
        .ok_or_else(invalid)?;
    if op == 0 {
        return Err(invalid());
    }
    let strategy = QueryStrategy::from_code(op).ok_or(QueryError::UnsupportedStrategy(op))?;

    Ok(QueryPredicate::new(strategy, path, value.clone()))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_json(json: &str) -> Result<CompositeQuery, QueryError> {
        CompositeQuery::parse(&Value::parse_json(json).expect("json"))
    }

    #[test]
    fn parses_predicates_and_flags() {
        let spec = parse_json(r#"{"q": [{"op": 1, "a": 5}, {"op": 6, "b": [1, 2]}], "m": false, "or": true}"#)
            .expect("parse");

        assert_eq!(spec.predicates.len(), 2);
        assert_eq!(spec.predicates[0].strategy, QueryStrategy::Equal);
        assert_eq!(spec.predicates[1].path, "b");
        assert!(!spec.is_multikey);
        assert!(spec.is_ordered);
        assert!(!spec.is_backward);
    }

    #[test]
    fn multikey_defaults_to_true() {
        let spec = parse_json(r#"{"q": []}"#).expect("parse");

        assert!(spec.is_multikey);
        assert!(spec.predicates.is_empty());
    }

    #[test]
    fn unknown_keys_fail() {
        let err = parse_json(r#"{"q": [], "zz": 1}"#).expect_err("unknown key");

        assert_eq!(err.to_string(), "Unknown key for composite query zz");
    }

    #[test]
    fn predicate_shape_errors() {
        let err = parse_json(r#"{"q": 3}"#).expect_err("not an array");
        assert_eq!(
            err.to_string(),
            "extract query for composite expecting a single array value: not int"
        );

        let err = parse_json(r#"{"q": [1]}"#).expect_err("not a document");
        assert!(err.to_string().starts_with("extract query composite expecting a single document value"));

        let err = parse_json(r#"{"q": [{"a": 1}]}"#).expect_err("missing op");
        assert!(err.to_string().starts_with("extract query composite expecting a valid operator and value: op=0"));
    }

    #[test]
    fn unknown_operator_codes_are_unsupported() {
        let err = parse_json(r#"{"q": [{"op": 13, "a": 1}]}"#).expect_err("gap code");

        assert_eq!(err.to_string(), "Unsupported strategy for composite index: 13");
    }

    #[test]
    fn to_value_parses_back() {
        let spec = CompositeQuery::new(vec![
            QueryPredicate::new(QueryStrategy::GreaterThan, "a", Value::Int32(1)),
            QueryPredicate::new(QueryStrategy::Regex, "b", Value::text("^x")),
        ])
        .with_ordered(true)
        .with_backward(true)
        .with_correlated(true);

        assert_eq!(CompositeQuery::parse(&spec.to_value()).expect("parse"), spec);
    }
}
