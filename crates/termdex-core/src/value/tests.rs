use crate::value::{
    Decimal128, Value, ValueTag, compare_values, normalize_numeric, values_equal,
    wire::{self, DocumentWriter, WireError},
};
use proptest::prelude::*;
use std::cmp::Ordering;

// ---- helpers -----------------------------------------------------------

fn json(text: &str) -> Value {
    Value::parse_json(text).expect("test json should parse")
}

fn dec(text: &str) -> Value {
    Value::Decimal128(Decimal128::parse(text).expect("decimal literal"))
}

fn cmp(a: &Value, b: &Value) -> Ordering {
    compare_values(a, b).ordering
}

// ---- ordering ----------------------------------------------------------

#[test]
fn cross_type_order_follows_canonical_rank() {
    let ordered = [
        Value::MinKey,
        Value::Null,
        Value::Int32(-5),
        Value::text("a"),
        Value::document([("a", Value::Int32(1))]),
        Value::Array(vec![Value::Int32(1)]),
        Value::Binary {
            subtype: 0,
            bytes: vec![1],
        },
        Value::ObjectId([0; 12]),
        Value::Bool(false),
        Value::DateTime(0),
        Value::Timestamp {
            time: 0,
            increment: 0,
        },
        Value::Regex {
            pattern: "a".into(),
            options: String::new(),
        },
        Value::Code("x".into()),
        Value::MaxKey,
    ];

    for pair in ordered.windows(2) {
        assert_eq!(cmp(&pair[0], &pair[1]), Ordering::Less, "{pair:?}");
    }
}

#[test]
fn null_and_undefined_share_a_rank() {
    assert_eq!(cmp(&Value::Null, &Value::Undefined), Ordering::Equal);
}

#[test]
fn numbers_compare_exactly_across_types() {
    assert!(values_equal(&Value::Int32(1), &Value::Double(1.0)));
    assert!(values_equal(&Value::Int64(3), &dec("3.000")));
    assert_eq!(cmp(&Value::Int64(2), &Value::Double(2.5)), Ordering::Less);
    assert_eq!(cmp(&Value::Double(-2.5), &Value::Int32(-2)), Ordering::Less);
    assert_eq!(
        cmp(&Value::Int64(i64::MAX), &Value::Double(9.223_372_036_854_776e18)),
        Ordering::Less
    );
    assert_eq!(cmp(&dec("2.5"), &Value::Int32(2)), Ordering::Greater);
    assert!(values_equal(&dec("0.1"), &Value::Double(0.1)));
}

#[test]
fn nan_sorts_below_numbers_and_flags_decimal_mismatch() {
    assert_eq!(
        cmp(&Value::Double(f64::NAN), &Value::Double(f64::NEG_INFINITY)),
        Ordering::Less
    );
    assert!(values_equal(&Value::Double(f64::NAN), &Value::Double(f64::NAN)));

    let flagged = compare_values(&Value::Decimal128(Decimal128::NAN), &Value::Int32(1));
    assert_eq!(flagged.ordering, Ordering::Less);
    assert!(!flagged.is_valid);

    let reversed = compare_values(&Value::Int32(1), &Value::Decimal128(Decimal128::NAN));
    assert_eq!(reversed.ordering, Ordering::Greater);
}

#[test]
fn documents_compare_type_then_key_then_value_then_length() {
    let a = json(r#"{"a": 1}"#);
    let b = json(r#"{"a": "x"}"#);
    let c = json(r#"{"b": 0}"#);
    let d = json(r#"{"a": 1, "b": 1}"#);

    assert_eq!(cmp(&a, &b), Ordering::Less);
    assert_eq!(cmp(&a, &c), Ordering::Less);
    assert_eq!(cmp(&a, &d), Ordering::Less);
    assert_eq!(cmp(&json("{}"), &a), Ordering::Less);
}

#[test]
fn binary_compares_length_before_bytes() {
    let short = Value::Binary {
        subtype: 0,
        bytes: vec![9],
    };
    let long = Value::Binary {
        subtype: 0,
        bytes: vec![0, 0],
    };

    assert_eq!(cmp(&short, &long), Ordering::Less);
}

// ---- numeric helpers ---------------------------------------------------

#[test]
fn normalize_numeric_picks_smallest_exact_type() {
    assert_eq!(normalize_numeric(&Value::Double(4.0)), Value::Int32(4));
    assert_eq!(
        normalize_numeric(&Value::Int64(1 << 40)),
        Value::Int64(1 << 40)
    );
    assert_eq!(normalize_numeric(&dec("2.5")), Value::Double(2.5));
    assert_eq!(normalize_numeric(&Value::Double(0.5)), Value::Double(0.5));
    assert_eq!(
        normalize_numeric(&Value::text("x")),
        Value::text("x"),
        "non-numeric values pass through"
    );

    let huge = dec("1E+400");
    assert_eq!(normalize_numeric(&huge), huge);
}

#[test]
fn decimal_display_and_parse_agree() {
    for text in ["0", "-12.5", "1.25E-10", "1E+400", "NaN", "-Infinity"] {
        let parsed = Decimal128::parse(text).expect("parse");
        assert_eq!(Decimal128::parse(&parsed.to_string()), Some(parsed), "{text}");
    }
}

// ---- json --------------------------------------------------------------

#[test]
fn extended_json_forms_are_recognised() {
    assert_eq!(json(r#"{"$minKey": 1}"#), Value::MinKey);
    assert_eq!(json(r#"{"$maxKey": 1}"#), Value::MaxKey);
    assert_eq!(json(r#"{"$undefined": true}"#), Value::Undefined);
    assert_eq!(json(r#"{"$numberLong": "5"}"#), Value::Int64(5));
    assert_eq!(json(r#"{"$date": 10}"#), Value::DateTime(10));
    assert_eq!(
        json(r#"{"$regex": "^a", "$options": "i"}"#),
        Value::Regex {
            pattern: "^a".into(),
            options: "i".into()
        }
    );
    assert_eq!(
        json(r#"{"$oid": "000102030405060708090a0b"}"#),
        Value::ObjectId([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11])
    );
}

#[test]
fn operator_documents_stay_documents() {
    let value = json(r#"{"$gt": 5}"#);

    assert_eq!(value.get("$gt"), Some(&Value::Int32(5)));
}

#[test]
fn get_path_walks_documents_and_array_positions() {
    let doc = json(r#"{"a": {"b": [10, {"c": 3}]}}"#);

    assert_eq!(doc.get_path("a.b.0"), Some(&Value::Int32(10)));
    assert_eq!(doc.get_path("a.b.1.c"), Some(&Value::Int32(3)));
    assert_eq!(doc.get_path("a.b.c"), None);
}

// ---- wire --------------------------------------------------------------

#[test]
fn single_element_layout_is_bit_exact() {
    let bytes = wire::encode_single("a", &Value::Int32(1)).expect("encode");

    assert_eq!(
        bytes,
        vec![12, 0, 0, 0, ValueTag::Int32.to_u8(), b'a', 0, 1, 0, 0, 0, 0]
    );
    assert_eq!(wire::element_len("a", &Value::Int32(1)) + 5, bytes.len());
}

#[test]
fn wire_round_trips_every_type() {
    let doc = json(
        r#"{
            "n": null, "b": true, "i": 1, "l": {"$numberLong": "9"}, "d": 1.5,
            "m": {"$numberDecimal": "1.1"}, "s": "text", "o": {"x": [1, "y"]},
            "bin": {"$binary": {"hex": "0102", "subType": "04"}},
            "r": {"$regex": "p", "$options": "m"}, "t": {"$timestamp": {"t": 3, "i": 4}},
            "cws": {"$code": "f()", "$scope": {"k": 1}}, "lo": {"$minKey": 1},
            "hi": {"$maxKey": 1}, "u": {"$undefined": true}
        }"#,
    );
    let Value::Document(fields) = &doc else {
        panic!("document expected");
    };

    let bytes = wire::encode_document(fields).expect("encode");
    assert_eq!(bytes.len(), wire::document_len(fields));
    assert_eq!(wire::decode_document(&bytes).expect("decode"), *fields);
}

#[test]
fn decode_rejects_malformed_buffers() {
    assert!(matches!(
        wire::decode_document(&[5, 0, 0]),
        Err(WireError::Truncated { .. })
    ));
    assert!(matches!(
        wire::decode_document(&[9, 0, 0, 0, 0]),
        Err(WireError::BadLength { .. })
    ));
    assert!(matches!(
        wire::decode_document(&[8, 0, 0, 0, 0x42, b'a', 0, 0]),
        Err(WireError::UnknownType(0x42))
    ));
    assert!(matches!(
        wire::decode_document(&[5, 0, 0, 0, 1]),
        Err(WireError::MissingTerminator(_))
    ));
}

#[test]
fn interior_nul_keys_are_rejected() {
    assert!(matches!(
        wire::encode_single("a\0b", &Value::Null),
        Err(WireError::InteriorNul(_))
    ));
}

#[test]
fn writer_len_tracks_finished_size() {
    let mut writer = DocumentWriter::new();
    assert_eq!(writer.len(), 5);
    writer.append("k", &Value::text("v")).expect("append");
    let expected = writer.len();

    assert_eq!(writer.finish().len(), expected);
}

// ---- properties --------------------------------------------------------

fn arb_number() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::Int32),
        any::<i64>().prop_map(Value::Int64),
        (-1.0e12f64..1.0e12).prop_map(Value::Double),
        (any::<i32>(), -6i32..6).prop_map(|(c, e)| {
            Value::Decimal128(Decimal128::from_parts(
                c < 0,
                u128::from(c.unsigned_abs()),
                e,
            ))
        }),
    ]
}

proptest! {
    #[test]
    fn numeric_compare_is_antisymmetric(a in arb_number(), b in arb_number()) {
        prop_assert_eq!(cmp(&a, &b), cmp(&b, &a).reverse());
    }

    #[test]
    fn normalize_preserves_numeric_order(a in arb_number(), b in arb_number()) {
        let na = normalize_numeric(&a);
        let nb = normalize_numeric(&b);
        // double conversion may merge adjacent decimals but never flips them
        let before = cmp(&a, &b);
        let after = cmp(&na, &nb);
        prop_assert!(after == before || after == Ordering::Equal);
    }
}
