//! Size-bounded writing of term values.
//!
//! Containers are written element by element against a soft limit that
//! keeps room for one more fixed-size value, so two truncated containers
//! stop at comparable positions regardless of the next element's type.

use crate::{
    term::TermError,
    value::{Document, Value, ValueTag, normalize_numeric, wire::DocumentWriter},
};
use tracing::debug;

const TARGET: &str = "termdex::term";

/// Largest fixed-size array element: 4-byte index key, type code, decimal128.
pub const ARRAY_FIXED_OVERHEAD: i32 = 21;

/// Largest fixed-size document value plus its type code.
pub const DOCUMENT_FIXED_OVERHEAD: i32 = 17;

/// Room kept at the top level for a trailing MaxKey element.
pub const DOCUMENT_MAXKEY_RESERVE: i32 = 2;

/// Encoded document framing (length + terminator), key NUL and type code.
pub const TERM_FIXED_OVERHEAD: i32 = 5 + 2;

// type code of a nested string-like value; the key is accounted by the caller
const NESTED_STRING_PREFIX: i32 = 1;

// room for an array index key ("900\0")
const ARRAY_INDEX_RESERVE: i32 = 4;

pub(super) fn len_i32(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// Write `{path: value}` into `writer`, truncating against `limit`.
/// Returns whether the value was truncated.
pub(super) fn write_truncated(
    writer: &mut DocumentWriter,
    path: &str,
    value: &Value,
    limit: i32,
) -> Result<bool, TermError> {
    let data_size = TERM_FIXED_OVERHEAD.saturating_add(len_i32(path.len()));
    if data_size >= limit {
        return Err(TermError::PathExceedsLimit { data_size, limit });
    }

    match value {
        Value::Array(items) => {
            let mut nested = DocumentWriter::new();
            let truncated = truncate_array(
                items,
                data_size,
                limit - ARRAY_FIXED_OVERHEAD,
                limit,
                &mut nested,
            )?;
            writer.append_array(path, nested)?;

            Ok(truncated)
        }
        Value::Document(fields) => {
            let mut nested = DocumentWriter::new();
            let truncated = truncate_document(
                fields,
                data_size,
                limit - DOCUMENT_FIXED_OVERHEAD,
                limit - DOCUMENT_MAXKEY_RESERVE,
                &mut nested,
            )?;
            writer.append_document(path, nested)?;

            Ok(truncated)
        }
        _ => match string_like_len(value) {
            Some(len) => write_string_like(writer, path, value, data_size, limit, len),
            None => {
                writer.append(path, value)?;
                Ok(false)
            }
        },
    }
}

/// Write array elements until the soft limit is crossed.
fn truncate_array(
    items: &[Value],
    data_size: i32,
    soft_limit: i32,
    hard_limit: i32,
    writer: &mut DocumentWriter,
) -> Result<bool, TermError> {
    let mut force_not_truncated = false;
    let mut last_tag = ValueTag::MinKey;

    for (index, item) in items.iter().enumerate() {
        let current = len_i32(writer.len());
        if current + data_size > soft_limit {
            return Ok(limit_reached(force_not_truncated, last_tag));
        }
        force_not_truncated = false;
        last_tag = item.tag();

        let budget = hard_limit - data_size - ARRAY_INDEX_RESERVE;
        if truncate_nested_entry(
            writer,
            &index.to_string(),
            item,
            &mut force_not_truncated,
            budget,
            current,
        )? {
            return Ok(true);
        }
    }

    let current = len_i32(writer.len());
    Ok(current + data_size > soft_limit && !force_not_truncated)
}

/// Write document fields until the soft limit is crossed. A key that no
/// longer fits with its value is written with a MaxKey value.
fn truncate_document(
    fields: &Document,
    existing: i32,
    soft_limit: i32,
    hard_limit: i32,
    writer: &mut DocumentWriter,
) -> Result<bool, TermError> {
    let mut force_not_truncated = false;
    let mut last_tag = ValueTag::MinKey;

    for (key, value) in fields {
        let current = len_i32(writer.len());
        if current + existing > soft_limit {
            return Ok(limit_reached(force_not_truncated, last_tag));
        }
        force_not_truncated = false;
        last_tag = value.tag();

        let key_len = len_i32(key.len());
        let required = current + existing + key_len + 2;

        if required < soft_limit {
            let budget = hard_limit - existing - key_len - 2;
            if truncate_nested_entry(
                writer,
                key,
                value,
                &mut force_not_truncated,
                budget,
                current,
            )? {
                return Ok(true);
            }
        } else if required < hard_limit {
            writer.append(key, &Value::MaxKey)?;
            return Ok(true);
        } else {
            let keep = (key_len - (required - hard_limit)).max(0) as usize;
            writer.append(cut_str(key, keep), &Value::MaxKey)?;
            return Ok(true);
        }
    }

    let current = len_i32(writer.len());
    Ok(current + existing > soft_limit && !force_not_truncated)
}

fn limit_reached(force_not_truncated: bool, last_tag: ValueTag) -> bool {
    if force_not_truncated {
        debug!(
            target: TARGET,
            last_type = last_tag.label(),
            "truncation limit reached after a value that cannot be truncated"
        );
    }

    !force_not_truncated
}

/// Write one container element within `budget`.
fn truncate_nested_entry(
    writer: &mut DocumentWriter,
    key: &str,
    value: &Value,
    force_not_truncated: &mut bool,
    budget: i32,
    current_len: i32,
) -> Result<bool, TermError> {
    match value {
        Value::MaxKey
        | Value::MinKey
        | Value::Bool(_)
        | Value::DateTime(_)
        | Value::Null
        | Value::ObjectId(_)
        | Value::Timestamp { .. }
        | Value::Undefined => {
            writer.append(key, value)?;
            Ok(false)
        }

        // one numeric representation per value keeps mixed-type arrays
        // comparable at the truncation boundary
        Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal128(_) => {
            writer.append(key, &normalize_numeric(value))?;
            Ok(false)
        }

        Value::Document(fields) => {
            let mut nested = DocumentWriter::new();
            let truncated = truncate_document(
                fields,
                current_len,
                budget - DOCUMENT_FIXED_OVERHEAD,
                budget,
                &mut nested,
            )?;
            writer.append_document(key, nested)?;

            Ok(truncated)
        }

        Value::Array(items) => {
            let mut nested = DocumentWriter::new();
            let truncated = truncate_array(
                items,
                current_len,
                budget - ARRAY_FIXED_OVERHEAD,
                budget,
                &mut nested,
            )?;
            writer.append_array(key, nested)?;

            Ok(truncated)
        }

        // TODO: cut regex patterns once the query side can recheck a truncated regex term
        Value::Regex { .. } | Value::DbPointer { .. } | Value::CodeWithScope { .. } => {
            *force_not_truncated = true;
            writer.append(key, value)?;
            Ok(false)
        }

        Value::Text(_) | Value::Symbol(_) | Value::Code(_) | Value::Binary { .. } => {
            let len = string_like_len(value).unwrap_or(0);
            write_string_like(
                writer,
                key,
                value,
                NESTED_STRING_PREFIX,
                budget - current_len,
                len,
            )
        }
    }
}

fn write_string_like(
    writer: &mut DocumentWriter,
    key: &str,
    value: &Value,
    data_size: i32,
    limit: i32,
    len: usize,
) -> Result<bool, TermError> {
    match truncated_len(data_size, limit, value.tag(), len)? {
        Some(keep) => {
            writer.append(key, &cut_value(value, keep))?;
            Ok(true)
        }
        None => {
            writer.append(key, value)?;
            Ok(false)
        }
    }
}

/// Payload length to keep when a string-like value does not fit, or `None`
/// when it fits as is.
pub(super) fn truncated_len(
    data_size: i32,
    limit: i32,
    tag: ValueTag,
    len: usize,
) -> Result<Option<usize>, TermError> {
    let len_i = len_i32(len);
    let required = data_size
        .saturating_add(4)
        .saturating_add(len_i)
        .saturating_add(1);
    if required <= limit {
        return Ok(None);
    }

    let excess = required - limit;
    if excess >= len_i {
        return Err(TermError::ValueExceedsLimit {
            length: len,
            type_name: tag.label(),
            limit,
        });
    }

    Ok(Some((len_i - excess) as usize))
}

fn string_like_len(value: &Value) -> Option<usize> {
    match value {
        Value::Text(s) | Value::Symbol(s) | Value::Code(s) => Some(s.len()),
        Value::Binary { bytes, .. } => Some(bytes.len()),
        _ => None,
    }
}

fn cut_value(value: &Value, keep: usize) -> Value {
    match value {
        Value::Text(s) => Value::Text(cut_str(s, keep).to_string()),
        Value::Symbol(s) => Value::Symbol(cut_str(s, keep).to_string()),
        Value::Code(s) => Value::Code(cut_str(s, keep).to_string()),
        Value::Binary { subtype, bytes } => Value::Binary {
            subtype: *subtype,
            bytes: bytes[..keep.min(bytes.len())].to_vec(),
        },
        other => other.clone(),
    }
}

/// Longest prefix of `s` that is at most `max` bytes and ends on a char
/// boundary.
pub(super) fn cut_str(s: &str, max: usize) -> &str {
    if max >= s.len() {
        return s;
    }

    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }

    &s[..end]
}
