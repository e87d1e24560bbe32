use crate::{
    obs::sink::{self, MetricsEvent},
    term::{
        SerializedTerm, TermCreateMetadata, TermError, TermMetadata,
        truncate::{len_i32, write_truncated},
    },
    value::{Value, wire::DocumentWriter},
};
use std::borrow::Cow;

/// Stored path for prefixed and wildcard terms.
const PATH_PLACEHOLDER: &str = "$";

/// Encode `{path: value}` as a data term.
pub fn serialize_term(
    path: &str,
    value: &Value,
    create: &TermCreateMetadata,
) -> Result<SerializedTerm, TermError> {
    serialize_term_with_metadata(path, value, create, TermMetadata::NoMetadata)
}

/// Encode `{path: value}` with an explicit base metadata byte.
///
/// A truncated data term is tagged `Truncated`; the descending variant is
/// applied last. The encoded document must fit the size limit.
pub fn serialize_term_with_metadata(
    path: &str,
    value: &Value,
    create: &TermCreateMetadata,
    metadata: TermMetadata,
) -> Result<SerializedTerm, TermError> {
    let stored_path = rewrite_path(path, create)?;

    let mut writer = DocumentWriter::new();
    let is_truncated_value = if create.size_limit <= 0 {
        writer.append(&stored_path, value)?;
        false
    } else {
        write_truncated(&mut writer, &stored_path, value, create.size_limit)?
    };

    let mut metadata = metadata;
    if is_truncated_value && metadata == TermMetadata::NoMetadata {
        metadata = TermMetadata::Truncated;
        sink::record(MetricsEvent::TermTruncated);
    }
    let is_root_metadata = metadata.is_metadata();
    if create.is_descending {
        metadata = metadata.to_descending()?;
    }

    let document = writer.finish();
    if create.size_limit > 0 && document.len() > create.size_limit as usize {
        return Err(TermError::TermTooLarge {
            limit: create.size_limit,
            type_name: value.type_name(),
            size: document.len(),
            is_truncated: metadata.is_truncated(),
        });
    }

    let mut bytes = Vec::with_capacity(document.len() + 1);
    bytes.push(metadata.to_u8());
    bytes.extend_from_slice(&document);

    Ok(SerializedTerm {
        bytes,
        is_truncated: metadata.is_truncated(),
        is_root_metadata,
    })
}

// Shorten the stored path. Non-wildcard prefixed paths collapse to the
// placeholder; wildcard paths keep only their suffix after the prefix.
fn rewrite_path<'a>(path: &'a str, create: &TermCreateMetadata) -> Result<Cow<'a, str>, TermError> {
    let prefix = create.path_prefix.as_str();

    if !create.is_wildcard && !prefix.is_empty() && !path.is_empty() {
        if path != prefix {
            return Err(TermError::PrefixMismatch {
                path: path.to_string(),
                prefix: prefix.to_string(),
            });
        }

        return Ok(Cow::Borrowed(PATH_PLACEHOLDER));
    }

    if create.size_limit > 0 && create.is_wildcard {
        let mut stored = Cow::Borrowed(path);
        if !create.is_wildcard_projection && !prefix.is_empty() && !path.is_empty() {
            match path.len().checked_sub(prefix.len()) {
                Some(0) => stored = Cow::Borrowed(PATH_PLACEHOLDER),
                Some(_) => {
                    let suffix = path.get(prefix.len()..).unwrap_or_default();
                    stored = Cow::Owned(format!("{PATH_PLACEHOLDER}{suffix}"));
                }
                None => {}
            }
        }

        if len_i32(stored.len()) > create.wildcard_path_limit {
            return Err(TermError::WildcardPathTooLong {
                limit: create.wildcard_path_limit,
            });
        }

        return Ok(stored);
    }

    Ok(Cow::Borrowed(path))
}
