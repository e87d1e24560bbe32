//! Readable listing of the terms a document generates.

use crate::{
    composite::{CompositeTerm, is_composite},
    error::InternalError,
    generate::generate_terms,
    options::IndexOptions,
    term::{IndexTerm, TermError},
    value::Value,
};

const TRUNCATED_KEY: &str = "t";
const COMPOSITE_KEY: &str = "$";

/// Decode every term `document` stores, sentinels included, one value per
/// term. A single-path term is `{path: value}`; a composite term is
/// `{"$": [value, ...]}`. With `add_metadata` each value also carries its
/// `"t"` truncation flag, and composite entries become
/// `{path: value, "t": bool}` documents.
pub fn generated_terms(
    document: &Value,
    options: &IndexOptions,
    add_metadata: bool,
) -> Result<Vec<Value>, InternalError> {
    let set = generate_terms(document, options, true)?;

    set.iter_bytes()
        .map(|bytes| describe_term(bytes, add_metadata).map_err(InternalError::from))
        .collect()
}

fn describe_term(bytes: &[u8], add_metadata: bool) -> Result<Value, TermError> {
    if !is_composite(bytes) {
        return Ok(describe_single(&IndexTerm::decode(bytes)?, add_metadata));
    }

    let entries = CompositeTerm::parse(bytes)?
        .decode_all()?
        .into_iter()
        .map(|term| {
            if add_metadata {
                describe_single(&term, true)
            } else {
                term.value
            }
        })
        .collect();

    Ok(Value::document([(COMPOSITE_KEY, Value::Array(entries))]))
}

fn describe_single(term: &IndexTerm, add_metadata: bool) -> Value {
    let mut fields = vec![(term.path.clone(), term.value.clone())];
    if add_metadata {
        fields.push((TRUNCATED_KEY.to_string(), Value::Bool(term.is_truncated())));
    }

    Value::Document(fields)
}

///
/// TESTS
///
