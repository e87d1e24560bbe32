use super::*;
use crate::{
    composite::CompositeTerm,
    term::IndexTerm,
};
use proptest::prelude::*;

fn doc(json: &str) -> Value {
    Value::parse_json(json).expect("json")
}

fn sub_terms(term: &SerializedTerm) -> Vec<IndexTerm> {
    CompositeTerm::from_stored(term.as_bytes())
        .expect("composite")
        .decode_all()
        .expect("decode")
}

fn values(term: &SerializedTerm) -> Vec<Value> {
    sub_terms(term).into_iter().map(|t| t.value).collect()
}

fn primary_count(set: &DocumentTermSet) -> usize {
    set.terms
        .iter()
        .filter(|t| {
            let first = &sub_terms(t)[0];
            !(first.is_metadata() || first.is_root_truncation_term())
        })
        .count()
}

#[test]
fn array_path_multiplies_terms_and_flags_multi_key() {
    let options = IndexOptions::from_paths(["a", "b"]).expect("options");
    let set = generate_terms(&doc(r#"{"a": [1, 2], "b": "x"}"#), &options, true)
        .expect("generate");

    assert_eq!(set.len(), 3);
    assert!(set.has_multi_key);
    assert!(!set.has_truncation);
    assert_eq!(values(&set.terms[0]), vec![Value::Int32(1), Value::text("x")]);
    assert_eq!(values(&set.terms[1]), vec![Value::Int32(2), Value::text("x")]);
    assert!(sub_terms(&set.terms[0]).iter().all(|t| t.path == "$"));

    let sentinel = &sub_terms(&set.terms[2])[0];
    assert!(sentinel.is_metadata());
    assert_eq!(sentinel.value, Value::Array(Vec::new()));
}

#[test]
fn missing_path_becomes_undefined_sub_term() {
    let options = IndexOptions::from_paths(["a", "b"]).expect("options");
    let set = generate_terms(&doc(r#"{"a": 1}"#), &options, true).expect("generate");

    assert_eq!(set.len(), 1);
    let parts = sub_terms(&set.terms[0]);
    assert_eq!(parts[0].value, Value::Int32(1));
    assert!(parts[1].is_value_undefined());
    assert_eq!(parts[1].path, "$");
}

#[test]
fn literal_null_is_not_undefined() {
    let options = IndexOptions::from_paths(["a", "b"]).expect("options");
    let set = generate_terms(&doc(r#"{"a": null, "b": []}"#), &options, false)
        .expect("generate");

    let parts = sub_terms(&set.terms[0]);
    assert_eq!(parts[0].value, Value::Null);
    assert!(!parts[0].is_value_undefined());
    assert!(parts[1].is_value_undefined());
    assert!(set.has_multi_key);
}

#[test]
fn single_path_terms_are_unmarked() {
    let options = IndexOptions::from_paths(["a"]).expect("options");
    let set = generate_terms(&doc(r#"{"a": 5}"#), &options, true).expect("generate");

    assert_eq!(set.len(), 1);
    assert!(!composite::is_composite(set.terms[0].as_bytes()));
    assert!(!set.has_multi_key);
}

#[test]
fn truncated_values_add_the_truncation_sentinel() {
    let options = IndexOptions::from_paths(["a"])
        .expect("options")
        .with_truncation_limit(40);
    let long = "x".repeat(100);
    let set = generate_terms(&Value::document([("a", Value::text(long))]), &options, true)
        .expect("generate");

    assert!(set.has_truncation);
    assert_eq!(set.len(), 2);
    assert!(set.terms[0].is_truncated);
    assert!(IndexTerm::decode(set.terms[1].as_bytes())
        .expect("decode")
        .is_root_truncation_term());
}

#[test]
fn sentinels_are_omitted_on_request() {
    let options = IndexOptions::from_paths(["a", "b"]).expect("options");
    let set = generate_terms(&doc(r#"{"a": [1, 2, 3], "b": [4, 5]}"#), &options, false)
        .expect("generate");

    assert_eq!(set.len(), 6);
    assert!(set.has_multi_key);
}

#[test]
fn correlated_generation_groups_by_array_element() {
    let document = doc(r#"{"a": [{"b": 1, "c": 10}, {"b": 2, "c": 20}], "d": 7}"#);
    let plain = IndexOptions::from_paths(["a.b", "a.c", "d"]).expect("options");
    let reduced = plain.clone().with_reduced_correlated_terms(true);

    let full = generate_terms(&document, &plain, false).expect("generate");
    assert_eq!(full.len(), 4);
    assert!(!full.is_correlated);

    let set = generate_terms(&document, &reduced, false).expect("generate");
    assert!(set.is_correlated);
    assert_eq!(set.len(), 3);
    assert_eq!(
        values(&set.terms[0]),
        vec![Value::Int32(1), Value::Int32(10), Value::Int32(7)]
    );
    assert_eq!(
        values(&set.terms[1]),
        vec![Value::Int32(2), Value::Int32(20), Value::Int32(7)]
    );

    let root = IndexTerm::decode(set.terms[2].as_bytes()).expect("decode");
    assert!(root.is_metadata());
    assert_eq!(root.value, Value::Int32(crate::term::CORRELATED_ROOT_ARRAY_KIND));
}

#[test]
fn correlated_element_without_a_path_uses_undefined() {
    let document = doc(r#"{"a": [{"b": 1}, {"b": 2, "c": 20}]}"#);
    let options = IndexOptions::from_paths(["a.b", "a.c"])
        .expect("options")
        .with_reduced_correlated_terms(true);
    let set = generate_terms(&document, &options, false).expect("generate");

    assert_eq!(set.len(), 3);
    let first = sub_terms(&set.terms[0]);
    assert_eq!(first[0].value, Value::Int32(1));
    assert!(first[1].is_value_undefined());
    assert_eq!(values(&set.terms[1]), vec![Value::Int32(2), Value::Int32(20)]);
}

#[test]
fn correlation_marks_a_single_path_array() {
    let document = doc(r#"{"a": [{"b": 1}, {"b": 2}], "d": 7}"#);
    let plain = IndexOptions::from_paths(["a.b", "d"]).expect("options");
    let reduced = plain.clone().with_reduced_correlated_terms(true);

    let full = generate_terms(&document, &plain, false).expect("generate");
    let set = generate_terms(&document, &reduced, false).expect("generate");
    assert!(set.is_correlated);
    assert_eq!(set.len(), full.len() + 1);
    assert_eq!(values(&set.terms[0]), vec![Value::Int32(1), Value::Int32(7)]);
    assert_eq!(values(&set.terms[1]), vec![Value::Int32(2), Value::Int32(7)]);

    let root = IndexTerm::decode(set.terms[2].as_bytes()).expect("decode");
    assert_eq!(root.value, Value::Int32(crate::term::CORRELATED_ROOT_ARRAY_KIND));

    let scalars = generate_terms(&doc(r#"{"a": {"b": 1}, "d": 7}"#), &reduced, false)
        .expect("generate");
    assert!(!scalars.is_correlated);
}

#[test]
fn key_spec_terms_follow_sort_order_without_sentinels() {
    let key_spec = Value::document([("a", Value::Int32(-1)), ("b", Value::Int32(1))]);
    let set = generate_terms_from_key_spec(&doc(r#"{"a": [1, 2], "b": 3}"#), &key_spec)
        .expect("generate");

    assert_eq!(set.len(), 2);
    let parts = sub_terms(&set.terms[0]);
    assert!(parts[0].is_descending());
    assert!(!parts[1].is_descending());
}

#[test]
fn wildcard_path_keeps_leaf_paths() {
    let options = IndexOptions::from_path_spec(r#"["a.$**", "b"]"#).expect("options");
    let set = generate_terms(&doc(r#"{"a": {"x": 1, "y": 2}, "b": 3}"#), &options, true)
        .expect("generate");

    assert_eq!(set.len(), 2);
    assert!(!set.has_multi_key);
    let parts = sub_terms(&set.terms[1]);
    assert_eq!(parts[0].path, "a.y");
    assert_eq!(parts[0].value, Value::Int32(2));
    assert_eq!(parts[1].value, Value::Int32(3));
}

#[test]
fn wildcard_without_matches_uses_root_undefined() {
    let options = IndexOptions::from_path_spec(r#"["a.$**", "b"]"#).expect("options");
    let set = generate_terms(&doc(r#"{"b": 3}"#), &options, true).expect("generate");

    assert_eq!(set.len(), 1);
    let parts = sub_terms(&set.terms[0]);
    assert!(parts[0].is_value_undefined());
    assert!(parts[0].path.is_empty());
}

#[test]
fn unencodable_path_fails_the_document() {
    let options = IndexOptions::from_paths(["a", "b"])
        .expect("options")
        .with_truncation_limit(16);

    let err = generate_terms(&doc(r#"{"a": 1, "b": 2}"#), &options, true)
        .expect_err("limit below path overhead");
    assert!(matches!(
        err,
        GenerateError::Term(TermError::PathExceedsLimit { .. })
    ));
    assert!(InternalError::from(err).is_configuration());
}

proptest! {
    #[test]
    fn cartesian_completeness(k1 in 1usize..5, k2 in 1usize..5) {
        let a: Vec<Value> = (0..k1).map(|i| Value::Int64(i as i64)).collect();
        let b: Vec<Value> = (0..k2).map(|i| Value::text(i.to_string())).collect();
        let document = Value::document([("a", Value::Array(a)), ("b", Value::Array(b))]);
        let options = IndexOptions::from_paths(["a", "b"]).expect("options");

        let set = generate_terms(&document, &options, true).expect("generate");
        prop_assert_eq!(primary_count(&set), k1 * k2);
    }

    #[test]
    fn correlation_never_adds_primary_terms(k in 1usize..5) {
        let elements: Vec<Value> = (0..k)
            .map(|i| {
                let i = i32::try_from(i).expect("small");
                Value::document([("b", Value::Int32(i)), ("c", Value::Int32(-i))])
            })
            .collect();
        let document = Value::document([("a", Value::Array(elements))]);
        let plain = IndexOptions::from_paths(["a.b", "a.c"]).expect("options");
        let reduced = plain.clone().with_reduced_correlated_terms(true);

        let full = generate_terms(&document, &plain, true).expect("generate");
        let grouped = generate_terms(&document, &reduced, true).expect("generate");
        prop_assert!(primary_count(&grouped) <= primary_count(&full));
        prop_assert_eq!(primary_count(&grouped), k);
    }
}
