//! Module: options
//! Responsibility: composite index definition: ordered paths, limits and
//! the persisted option blobs.
//! Does not own: term encoding or traversal.
//! Boundary: every engine entry point receives `&IndexOptions` explicitly.

use crate::{
    composite::MAX_COMPOSITE_PATHS,
    error::{ErrorClass, ErrorOrigin, InternalError},
    serialize::{self, SerializeError},
    term::TermCreateMetadata,
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::ops::Not;
use thiserror::Error as ThisError;

/// Bytes reserved per sub-term for the composite length prefix.
pub const COMPOSITE_PATH_RESERVE: i32 = 4;

/// Default upper bound on a rewritten wildcard term path.
pub const DEFAULT_WILDCARD_PATH_LIMIT: i32 = i32::MAX;

const WILDCARD_SUFFIX: &str = "$**";
const MIN_PATH_SPEC_LEN: usize = 3;

///
/// OptionsError
///

#[derive(Debug, ThisError)]
pub enum OptionsError {
    #[error("A minimum of one filter path is required to be provided")]
    MissingPaths,

    #[error("index options must have a valid string path")]
    InvalidPath,

    #[error("Exceeded index max number of keys {max}. Found {found}")]
    TooManyPaths { max: usize, found: usize },

    #[error("invalid composite path spec: {0}")]
    InvalidSpec(String),

    #[error("Only one wildcard path is allowed in a composite index")]
    MultipleWildcards,

    #[error("wildcard path index {index} does not name the wildcard path of {paths} paths")]
    WildcardMismatch { index: i32, paths: usize },

    #[error("index option {option} must be between {min} and {max}, found {found}")]
    OutOfRange {
        option: &'static str,
        min: i64,
        max: i64,
        found: i64,
    },

    #[error("corrupt composite path spec: {0}")]
    Corrupt(String),
}

impl OptionsError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Corrupt(_) => ErrorClass::Corruption,
            _ => ErrorClass::Configuration,
        }
    }
}

impl From<OptionsError> for InternalError {
    fn from(err: OptionsError) -> Self {
        Self::new(err.class(), ErrorOrigin::Options, err.to_string())
    }
}

///
/// IndexedPath
///
/// One indexed path. A wildcard path stores only its prefix (empty for a
/// root wildcard) and matches every path below it.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IndexedPath {
    pub path: String,

    #[serde(default, skip_serializing_if = "Not::not")]
    pub is_descending: bool,

    #[serde(default, skip_serializing_if = "Not::not")]
    pub is_wildcard: bool,
}

impl IndexedPath {
    #[must_use]
    pub fn ascending(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_descending: false,
            is_wildcard: false,
        }
    }

    #[must_use]
    pub fn descending(path: impl Into<String>) -> Self {
        Self {
            is_descending: true,
            ..Self::ascending(path)
        }
    }

    /// Parse a user path, recognising `prefix.$**` and `$**` as wildcards.
    #[must_use]
    pub fn parse(spec: &str, is_descending: bool) -> Self {
        let (path, is_wildcard) = if spec == WILDCARD_SUFFIX {
            (String::new(), true)
        } else if let Some(prefix) = spec
            .strip_suffix(WILDCARD_SUFFIX)
            .and_then(|p| p.strip_suffix('.'))
        {
            (prefix.to_string(), true)
        } else {
            (spec.to_string(), false)
        };

        Self {
            path,
            is_descending,
            is_wildcard,
        }
    }

    /// Legacy sort order byte.
    #[must_use]
    pub const fn sort_order(&self) -> i8 {
        if self.is_descending { -1 } else { 1 }
    }

    /// Whether `path` is a strict descendant of this wildcard path.
    #[must_use]
    pub fn matches_wildcard(&self, path: &str) -> bool {
        if self.path.is_empty() {
            return !path.is_empty();
        }

        path.strip_prefix(self.path.as_str())
            .is_some_and(|rest| rest.len() > 1 && rest.starts_with('.'))
    }

    /// Whether a query on `path` targets this indexed path.
    #[must_use]
    pub fn matches_query_path(&self, path: &str) -> bool {
        if self.is_wildcard {
            self.matches_wildcard(path)
        } else {
            self.path == path
        }
    }
}

///
/// IndexOptions
///
/// Definition-time options of one composite index. Immutable after
/// `validate`; persisted with `to_bytes`.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IndexOptions {
    #[serde(rename = "p")]
    pub paths: Vec<IndexedPath>,

    /// Soft term size budget for the whole composite; -1 is unlimited.
    #[serde(rename = "tl", default = "default_truncation_limit")]
    pub truncation_limit: i32,

    /// Position of the wildcard path, or -1.
    #[serde(rename = "wki", default = "default_wildcard_index")]
    pub wildcard_index: i32,

    #[serde(rename = "wkl", default = "default_wildcard_path_limit")]
    pub wildcard_path_limit: i32,

    #[serde(rename = "rct", default)]
    pub enable_reduced_correlated_terms: bool,

    #[serde(rename = "v", default)]
    pub version: u8,
}

const fn default_truncation_limit() -> i32 {
    -1
}

const fn default_wildcard_index() -> i32 {
    -1
}

const fn default_wildcard_path_limit() -> i32 {
    DEFAULT_WILDCARD_PATH_LIMIT
}

impl IndexOptions {
    /// Options over `paths` with every limit at its default.
    pub fn new(paths: Vec<IndexedPath>) -> Result<Self, OptionsError> {
        let wildcard_index = paths
            .iter()
            .position(|p| p.is_wildcard)
            .map_or(-1, |i| i32::try_from(i).unwrap_or(i32::MAX));

        let options = Self {
            paths,
            truncation_limit: default_truncation_limit(),
            wildcard_index,
            wildcard_path_limit: DEFAULT_WILDCARD_PATH_LIMIT,
            enable_reduced_correlated_terms: false,
            version: 0,
        };
        options.validate()?;

        Ok(options)
    }

    /// Ascending, non-wildcard options over plain path strings.
    pub fn from_paths<I, S>(paths: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(paths.into_iter().map(IndexedPath::ascending).collect())
    }

    /// Parse the user path spec: a JSON array of path strings or single
    /// `{path: order}` objects.
    pub fn from_path_spec(spec: &str) -> Result<Self, OptionsError> {
        if spec.len() < MIN_PATH_SPEC_LEN {
            return Err(OptionsError::MissingPaths);
        }

        let parsed: serde_json::Value =
            serde_json::from_str(spec).map_err(|e| OptionsError::InvalidSpec(e.to_string()))?;
        let serde_json::Value::Array(entries) = parsed else {
            return Err(OptionsError::InvalidSpec(
                "path spec must be an array".to_string(),
            ));
        };
        check_path_count(entries.len())?;

        let paths = entries
            .iter()
            .map(|entry| match entry {
                serde_json::Value::String(path) => Ok(IndexedPath::parse(path, false)),
                serde_json::Value::Object(fields) => {
                    let (path, order) = fields.iter().next().ok_or(OptionsError::InvalidPath)?;
                    let order = order.as_f64().ok_or(OptionsError::InvalidPath)?;
                    Ok(IndexedPath::parse(path, order < 0.0))
                }
                _ => Err(OptionsError::InvalidPath),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(paths)
    }

    /// Options from an index key document `{path: order, ...}`.
    pub fn from_key_spec(key_spec: &Value) -> Result<Self, OptionsError> {
        let Value::Document(fields) = key_spec else {
            return Err(OptionsError::InvalidSpec(format!(
                "key spec must be a document, found {}",
                key_spec.type_name()
            )));
        };
        check_path_count(fields.len())?;

        let paths = fields
            .iter()
            .map(|(path, order)| {
                let is_ascending = order.as_f64().is_some_and(|o| o > 0.0);
                IndexedPath::parse(path, !is_ascending)
            })
            .collect();

        Self::new(paths)
    }

    #[must_use]
    pub const fn with_truncation_limit(mut self, limit: i32) -> Self {
        self.truncation_limit = limit;
        self
    }

    #[must_use]
    pub const fn with_wildcard_path_limit(mut self, limit: i32) -> Self {
        self.wildcard_path_limit = limit;
        self
    }

    #[must_use]
    pub const fn with_reduced_correlated_terms(mut self, enabled: bool) -> Self {
        self.enable_reduced_correlated_terms = enabled;
        self
    }

    /// Definition-time checks.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.paths.is_empty() {
            return Err(OptionsError::MissingPaths);
        }
        check_path_count(self.paths.len())?;

        check_range("tl", i64::from(self.truncation_limit), -1, i64::from(i32::MAX))?;
        check_range(
            "wki",
            i64::from(self.wildcard_index),
            -1,
            MAX_COMPOSITE_PATHS as i64,
        )?;
        check_range(
            "wkl",
            i64::from(self.wildcard_path_limit),
            1,
            i64::from(i32::MAX),
        )?;
        check_range("v", i64::from(self.version), 0, 1)?;

        let wildcards: Vec<usize> = self
            .paths
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.is_wildcard.then_some(i))
            .collect();
        if wildcards.len() > 1 {
            return Err(OptionsError::MultipleWildcards);
        }

        let declared = usize::try_from(self.wildcard_index).ok();
        if declared != wildcards.first().copied() {
            return Err(OptionsError::WildcardMismatch {
                index: self.wildcard_index,
                paths: self.paths.len(),
            });
        }

        Ok(())
    }

    #[must_use]
    pub const fn path_count(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn path(&self, index: usize) -> Option<&IndexedPath> {
        self.paths.get(index)
    }

    /// Position of the wildcard path, if any.
    #[must_use]
    pub fn wildcard_path_index(&self) -> Option<usize> {
        usize::try_from(self.wildcard_index).ok()
    }

    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        self.wildcard_path_index().is_some()
    }

    /// Position of the indexed path a query on `path` targets.
    #[must_use]
    pub fn find_query_path(&self, path: &str) -> Option<usize> {
        self.paths.iter().position(|p| p.matches_query_path(path))
    }

    /// Per-path share of the truncation budget.
    #[must_use]
    pub fn path_size_limit(&self) -> i32 {
        let count = i32::try_from(self.paths.len().max(1)).unwrap_or(i32::MAX);

        self.truncation_limit / count - COMPOSITE_PATH_RESERVE
    }

    /// Term creation context for document terms on path `index`.
    #[must_use]
    pub fn path_metadata(&self, index: usize) -> TermCreateMetadata {
        let path = self.paths.get(index);

        TermCreateMetadata {
            size_limit: self.path_size_limit(),
            wildcard_path_limit: self.wildcard_path_limit,
            path_prefix: path.map(|p| p.path.clone()).unwrap_or_default(),
            is_wildcard: path.is_some_and(|p| p.is_wildcard),
            is_wildcard_projection: false,
            is_descending: path.is_some_and(|p| p.is_descending),
        }
    }

    /// Term creation context for query bound terms on path `index`. Bound
    /// terms of non-wildcard paths are written directly at the placeholder
    /// path, so no prefix applies.
    #[must_use]
    pub fn bound_metadata(&self, index: usize) -> TermCreateMetadata {
        let mut metadata = self.path_metadata(index);
        if !metadata.is_wildcard {
            metadata.path_prefix.clear();
        }

        metadata
    }

    /// Context for root and sentinel terms: unlimited, unprefixed.
    #[must_use]
    pub fn composite_metadata(&self) -> TermCreateMetadata {
        TermCreateMetadata {
            wildcard_path_limit: self.wildcard_path_limit,
            ..TermCreateMetadata::unlimited()
        }
    }

    /// Persist the options.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        serialize::serialize(self)
    }

    /// Re-parse persisted options and validate them.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InternalError> {
        let options: Self = serialize::deserialize(bytes)?;
        options.validate()?;

        Ok(options)
    }

    /// Legacy path spec blob: `u32 count`, then per path `u32 len`, the
    /// path bytes, a NUL and an `i8` sort order. All integers are LE.
    #[must_use]
    pub fn encode_path_spec(&self) -> Vec<u8> {
        let size = 4 + self
            .paths
            .iter()
            .map(|p| 4 + p.path.len() + 2)
            .sum::<usize>();

        let mut out = Vec::with_capacity(size);
        out.extend_from_slice(&len_u32(self.paths.len()).to_le_bytes());
        for path in &self.paths {
            out.extend_from_slice(&len_u32(path.path.len()).to_le_bytes());
            out.extend_from_slice(path.path.as_bytes());
            out.push(0);
            out.extend_from_slice(&path.sort_order().to_le_bytes());
        }

        out
    }

    /// Decode a legacy path spec blob into `(path, sort_order)` pairs.
    pub fn decode_path_spec(bytes: &[u8]) -> Result<Vec<(String, i8)>, OptionsError> {
        let (count, mut rest) = take_u32(bytes)?;
        let count = count as usize;
        check_path_count(count)?;

        let mut paths = Vec::with_capacity(count);
        for _ in 0..count {
            let (len, tail) = take_u32(rest)?;
            let len = len as usize;
            let Some((path, tail)) = tail.split_at_checked(len) else {
                return Err(OptionsError::Corrupt(format!(
                    "path of {len} bytes with {} remaining",
                    tail.len()
                )));
            };
            let [0, order, tail @ ..] = tail else {
                return Err(OptionsError::Corrupt(
                    "missing path terminator or sort order".to_string(),
                ));
            };

            let path = std::str::from_utf8(path)
                .map_err(|e| OptionsError::Corrupt(e.to_string()))?
                .to_string();
            paths.push((path, i8::from_le_bytes([*order])));
            rest = tail;
        }

        if !rest.is_empty() {
            return Err(OptionsError::Corrupt(format!(
                "{} trailing bytes",
                rest.len()
            )));
        }

        Ok(paths)
    }
}

fn check_path_count(found: usize) -> Result<(), OptionsError> {
    if found > MAX_COMPOSITE_PATHS {
        return Err(OptionsError::TooManyPaths {
            max: MAX_COMPOSITE_PATHS,
            found,
        });
    }

    Ok(())
}

const fn check_range(option: &'static str, found: i64, min: i64, max: i64) -> Result<(), OptionsError> {
    if found < min || found > max {
        return Err(OptionsError::OutOfRange {
            option,
            min,
            max,
            found,
        });
    }

    Ok(())
}

fn take_u32(bytes: &[u8]) -> Result<(u32, &[u8]), OptionsError> {
    let (head, tail) = bytes
        .split_first_chunk::<4>()
        .ok_or_else(|| OptionsError::Corrupt(format!("{} bytes left for a length", bytes.len())))?;

    Ok((u32::from_le_bytes(*head), tail))
}

#[allow(clippy::cast_possible_truncation)]
const fn len_u32(len: usize) -> u32 {
    // counts are bounded by validation; paths come from parsed text
    len as u32
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_spec_accepts_strings_and_ordered_objects() {
        let options =
            IndexOptions::from_path_spec(r#"["a", {"b": -1}, {"c.d": 1}]"#).expect("options");

        assert_eq!(
            options.paths,
            vec![
                IndexedPath::ascending("a"),
                IndexedPath::descending("b"),
                IndexedPath::ascending("c.d"),
            ]
        );
        assert_eq!(options.truncation_limit, -1);
        assert_eq!(options.wildcard_index, -1);
        assert!(!options.enable_reduced_correlated_terms);
    }

    #[test]
    fn path_spec_rejects_short_and_invalid_input() {
        assert!(matches!(
            IndexOptions::from_path_spec("[]"),
            Err(OptionsError::MissingPaths)
        ));
        assert!(matches!(
            IndexOptions::from_path_spec("[1, 2]"),
            Err(OptionsError::InvalidPath)
        ));
        assert_eq!(
            IndexOptions::from_path_spec("[]")
                .expect_err("short spec")
                .to_string(),
            "A minimum of one filter path is required to be provided"
        );
    }

    #[test]
    fn too_many_paths_fail_with_count() {
        let spec = format!(
            "[{}]",
            (0..33).map(|i| format!("\"p{i}\"")).collect::<Vec<_>>().join(",")
        );
        let err = IndexOptions::from_path_spec(&spec).expect_err("33 paths");

        assert_eq!(err.to_string(), "Exceeded index max number of keys 32. Found 33");
        assert_eq!(InternalError::from(err).class, ErrorClass::Configuration);
    }

    #[test]
    fn wildcard_paths_are_recognised_once() {
        let options = IndexOptions::from_path_spec(r#"["a", "b.$**"]"#).expect("options");
        assert_eq!(options.wildcard_path_index(), Some(1));
        assert_eq!(options.paths[1].path, "b");
        assert!(options.paths[1].matches_query_path("b.c"));
        assert!(!options.paths[1].matches_query_path("b"));
        assert!(!options.paths[1].matches_query_path("bc"));

        let root = IndexedPath::parse("$**", false);
        assert!(root.is_wildcard && root.path.is_empty());
        assert!(root.matches_wildcard("x"));

        assert!(matches!(
            IndexOptions::from_path_spec(r#"["a.$**", "$**"]"#),
            Err(OptionsError::MultipleWildcards)
        ));
    }

    #[test]
    fn key_spec_orders_by_sign() {
        let spec = Value::document([("a", Value::Int32(1)), ("b", Value::Double(-1.0))]);
        let options = IndexOptions::from_key_spec(&spec).expect("options");

        assert!(!options.paths[0].is_descending);
        assert!(options.paths[1].is_descending);
    }

    #[test]
    fn per_path_metadata_splits_the_budget() {
        let options = IndexOptions::from_path_spec(r#"["a", {"b": -1}]"#)
            .expect("options")
            .with_truncation_limit(200);

        let first = options.path_metadata(0);
        assert_eq!(first.size_limit, 96);
        assert_eq!(first.path_prefix, "a");
        assert!(!first.is_descending);

        let second = options.bound_metadata(1);
        assert!(second.is_descending);
        assert!(second.path_prefix.is_empty());

        assert_eq!(options.composite_metadata().size_limit, -1);
    }

    #[test]
    fn validate_checks_ranges() {
        let mut options = IndexOptions::from_paths(["a"]).expect("options");
        options.version = 2;
        assert!(matches!(
            options.validate(),
            Err(OptionsError::OutOfRange { option: "v", .. })
        ));

        let mut options = IndexOptions::from_paths(["a"]).expect("options");
        options.wildcard_index = 0;
        assert!(matches!(
            options.validate(),
            Err(OptionsError::WildcardMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn options_blob_round_trips_through_cbor() {
        let options = IndexOptions::from_path_spec(r#"["a", {"b": -1}]"#)
            .expect("options")
            .with_truncation_limit(512)
            .with_reduced_correlated_terms(true);

        let bytes = options.to_bytes().expect("serialize");
        assert_eq!(IndexOptions::from_bytes(&bytes).expect("deserialize"), options);
        assert!(IndexOptions::from_bytes(&[0xff, 0x00]).is_err());
    }

    #[test]
    fn legacy_path_spec_layout() {
        let options = IndexOptions::from_path_spec(r#"["ab", {"c": -1}]"#).expect("options");
        let bytes = options.encode_path_spec();

        assert_eq!(
            bytes,
            vec![2, 0, 0, 0, 2, 0, 0, 0, b'a', b'b', 0, 1, 1, 0, 0, 0, b'c', 0, 0xff]
        );
        assert_eq!(
            IndexOptions::decode_path_spec(&bytes).expect("decode"),
            vec![("ab".to_string(), 1), ("c".to_string(), -1)]
        );
        assert!(matches!(
            IndexOptions::decode_path_spec(&bytes[..bytes.len() - 1]),
            Err(OptionsError::Corrupt(_))
        ));
    }
}
