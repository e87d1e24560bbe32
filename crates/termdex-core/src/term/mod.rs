//! Module: term
//! Responsibility: single-path index terms, their metadata byte, truncation
//! and ordering.
//! Does not own: composite assembly or document traversal.
//! Boundary: every term written to or read from the index passes through here.

mod codec;
mod compare;
mod metadata;
mod root;
mod truncate;


use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    value::{
        Value,
        wire::{self, WireError},
    },
};
use thiserror::Error as ThisError;

pub use codec::{serialize_term, serialize_term_with_metadata};
pub use compare::compare_terms;
pub use metadata::{COMPOSITE_MARKER, TermMetadata};
pub use root::{CORRELATED_ROOT_ARRAY_KIND, RootTerm};
pub use truncate::{
    ARRAY_FIXED_OVERHEAD, DOCUMENT_FIXED_OVERHEAD, DOCUMENT_MAXKEY_RESERVE, TERM_FIXED_OVERHEAD,
};

/// Metadata byte plus the smallest encoded document.
pub const MIN_TERM_LEN: usize = 1 + wire::EMPTY_DOCUMENT_LEN + 1;

///
/// TermError
///

#[derive(Debug, ThisError)]
pub enum TermError {
    #[error(
        "Cannot create index key because the path length {data_size} exceeds truncation limit {limit}."
    )]
    PathExceedsLimit { data_size: i32, limit: i32 },

    #[error(
        "Cannot create index key required length {length} for type {type_name} exceeds max size {limit}."
    )]
    ValueExceedsLimit {
        length: usize,
        type_name: &'static str,
        limit: i32,
    },

    #[error(
        "Truncation size limit specified {limit}, but index term with type {type_name} was larger {size} - isTruncated {is_truncated}"
    )]
    TermTooLarge {
        limit: i32,
        type_name: &'static str,
        size: usize,
        is_truncated: bool,
    },

    #[error("Wildcard index key exceeded the maximum allowed size of {limit}.")]
    WildcardPathTooLong { limit: i32 },

    #[error("Wildcard Prefix path encountered with non-wildcard index - path {path}, prefix {prefix}")]
    PrefixMismatch { path: String, prefix: String },

    #[error("Unexpected term metadata {0} for descending index")]
    UnexpectedDescendingMetadata(u8),

    #[error("Cannot compare ascending and descending index terms")]
    MixedDirection,

    #[error("Cannot compare non-composite index terms as composite")]
    NotComposite,

    #[error("Index term exceeds maximum number of keys {max}")]
    TooManyKeys { max: usize },

    #[error("unknown term metadata byte 0x{0:02x}")]
    UnknownMetadata(u8),

    #[error("malformed index term: {0}")]
    Malformed(String),

    #[error(transparent)]
    Wire(#[from] WireError),
}

impl TermError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::PathExceedsLimit { .. } | Self::WildcardPathTooLong { .. } => {
                ErrorClass::Configuration
            }
            Self::ValueExceedsLimit { .. } | Self::TermTooLarge { .. } => ErrorClass::Encoding,
            Self::PrefixMismatch { .. }
            | Self::UnexpectedDescendingMetadata(_)
            | Self::MixedDirection
            | Self::NotComposite
            | Self::TooManyKeys { .. } => ErrorClass::Integrity,
            Self::UnknownMetadata(_) | Self::Malformed(_) => ErrorClass::Corruption,
            Self::Wire(WireError::InteriorNul(_)) => ErrorClass::Encoding,
            Self::Wire(_) => ErrorClass::Corruption,
        }
    }
}

impl From<TermError> for InternalError {
    fn from(err: TermError) -> Self {
        Self::new(err.class(), ErrorOrigin::Term, err.to_string())
    }
}

///
/// TermCreateMetadata
///
/// Per-path term creation context.
/// `size_limit <= 0` disables truncation.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TermCreateMetadata {
    pub size_limit: i32,
    pub wildcard_path_limit: i32,
    pub path_prefix: String,
    pub is_wildcard: bool,
    pub is_wildcard_projection: bool,
    pub is_descending: bool,
}

impl TermCreateMetadata {
    /// Unlimited, ascending, no prefix.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            size_limit: -1,
            wildcard_path_limit: i32::MAX,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_descending(mut self, is_descending: bool) -> Self {
        self.is_descending = is_descending;
        self
    }
}

///
/// SerializedTerm
///
/// Encoded term bytes plus the flags computed while encoding.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SerializedTerm {
    pub bytes: Vec<u8>,
    pub is_truncated: bool,
    pub is_root_metadata: bool,
}

impl SerializedTerm {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

///
/// IndexTerm
///
/// Decoded single-path term.
///

#[derive(Clone, Debug, PartialEq)]
pub struct IndexTerm {
    pub metadata: TermMetadata,
    pub path: String,
    pub value: Value,
}

impl IndexTerm {
    /// Decode a single-path term.
    pub fn decode(bytes: &[u8]) -> Result<Self, TermError> {
        if bytes.len() < MIN_TERM_LEN {
            return Err(TermError::Malformed(format!(
                "term of {} bytes is shorter than the minimum {MIN_TERM_LEN}",
                bytes.len()
            )));
        }

        let metadata = TermMetadata::from_u8(bytes[0])?;
        let (path, value) = wire::decode_single(&bytes[1..])?;

        Ok(Self {
            metadata,
            path,
            value,
        })
    }

    #[must_use]
    pub const fn is_metadata(&self) -> bool {
        self.metadata.is_metadata()
    }

    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.metadata.is_truncated()
    }

    #[must_use]
    pub const fn is_descending(&self) -> bool {
        self.metadata.is_descending()
    }

    #[must_use]
    pub const fn is_value_undefined(&self) -> bool {
        self.metadata.is_value_undefined()
    }

    #[must_use]
    pub const fn is_value_maybe_undefined(&self) -> bool {
        self.metadata.is_value_maybe_undefined()
    }

    /// The per-document "has truncated terms" sentinel.
    #[must_use]
    pub fn is_root_truncation_term(&self) -> bool {
        self.is_truncated() && self.path.is_empty() && matches!(self.value, Value::MaxKey)
    }
}

/// Truncation flag straight from the metadata byte of an encoded term.
#[must_use]
pub fn is_serialized_truncated(bytes: &[u8]) -> bool {
    bytes
        .first()
        .and_then(|b| TermMetadata::from_u8(*b).ok())
        .is_some_and(TermMetadata::is_truncated)
}

/// Whether an encoded term is a sentinel metadata term.
#[must_use]
pub fn is_serialized_metadata(bytes: &[u8]) -> bool {
    bytes.first() == Some(&TermMetadata::IsMetadata.to_u8())
}
