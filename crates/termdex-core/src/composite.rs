//! Module: composite
//! Responsibility: concatenation of per-path terms into one composite term,
//! and the index-wide term ordering.
//! Does not own: single-term encoding.
//! Boundary: stored composite blobs are split only through `CompositeTerm`.

use crate::term::{
    COMPOSITE_MARKER, IndexTerm, MIN_TERM_LEN, SerializedTerm, TermError, compare_terms,
    is_serialized_truncated,
};
use std::{borrow::Borrow, cmp::Ordering};

/// Maximum number of indexed paths (and sub-terms) per composite index.
pub const MAX_COMPOSITE_PATHS: usize = 32;

const LEN_PREFIX: usize = size_of::<u32>();

/// Join per-path terms into one composite term. A single term is returned
/// unchanged and unmarked.
pub fn assemble<T: Borrow<SerializedTerm>>(terms: &[T]) -> Result<SerializedTerm, TermError> {
    match terms {
        [] => Err(TermError::Malformed(
            "composite term requires at least one sub-term".to_string(),
        )),
        [single] => Ok(single.borrow().clone()),
        _ if terms.len() > MAX_COMPOSITE_PATHS => Err(TermError::TooManyKeys {
            max: MAX_COMPOSITE_PATHS,
        }),
        _ => {
            let total = 1 + terms
                .iter()
                .map(|t| LEN_PREFIX + t.borrow().bytes.len())
                .sum::<usize>();

            let mut bytes = Vec::with_capacity(total);
            bytes.push(COMPOSITE_MARKER);
            for term in terms {
                let term = term.borrow();
                let len = u32::try_from(term.bytes.len()).map_err(|_| {
                    TermError::Malformed(format!("sub-term of {} bytes", term.bytes.len()))
                })?;
                bytes.extend_from_slice(&len.to_le_bytes());
                bytes.extend_from_slice(&term.bytes);
            }

            Ok(SerializedTerm {
                bytes,
                is_truncated: terms.iter().any(|t| t.borrow().is_truncated),
                is_root_metadata: false,
            })
        }
    }
}

/// Whether `bytes` starts with the composite marker.
#[must_use]
pub fn is_composite(bytes: &[u8]) -> bool {
    bytes.first() == Some(&COMPOSITE_MARKER)
}

///
/// CompositeTerm
///
/// Borrowed view over the sub-terms of a stored term. A non-composite term
/// is viewed as a composite of one.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompositeTerm<'a> {
    parts: Vec<&'a [u8]>,
}

impl<'a> CompositeTerm<'a> {
    /// Split a marked composite blob.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, TermError> {
        if !is_composite(bytes) {
            return Err(TermError::NotComposite);
        }

        let mut parts = Vec::new();
        let mut rest = &bytes[1..];
        while !rest.is_empty() {
            if parts.len() >= MAX_COMPOSITE_PATHS {
                return Err(TermError::TooManyKeys {
                    max: MAX_COMPOSITE_PATHS,
                });
            }

            let (len_bytes, tail) = rest.split_first_chunk::<LEN_PREFIX>().ok_or_else(|| {
                TermError::Malformed(format!("{} trailing bytes in composite term", rest.len()))
            })?;
            let len = u32::from_le_bytes(*len_bytes) as usize;
            if len < MIN_TERM_LEN || len > tail.len() {
                return Err(TermError::Malformed(format!(
                    "sub-term length {len} with {} bytes remaining",
                    tail.len()
                )));
            }

            let (part, next) = tail.split_at(len);
            parts.push(part);
            rest = next;
        }

        Ok(Self { parts })
    }

    /// View any stored term; unmarked terms yield one part.
    pub fn from_stored(bytes: &'a [u8]) -> Result<Self, TermError> {
        if is_composite(bytes) {
            Self::parse(bytes)
        } else {
            Ok(Self { parts: vec![bytes] })
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Raw sub-term slices in path order.
    #[must_use]
    pub fn split(&self) -> &[&'a [u8]] {
        &self.parts
    }

    /// Decoded sub-terms in path order.
    pub fn iter(&self) -> impl Iterator<Item = Result<IndexTerm, TermError>> + '_ {
        self.parts.iter().map(|part| IndexTerm::decode(part))
    }

    /// Decode every sub-term.
    pub fn decode_all(&self) -> Result<Vec<IndexTerm>, TermError> {
        self.iter().collect()
    }

    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.parts.iter().any(|part| is_serialized_truncated(part))
    }

    fn byte_len(&self) -> usize {
        self.parts.iter().map(|p| LEN_PREFIX + p.len()).sum()
    }
}

/// Order two composite blobs sub-term by sub-term.
pub fn compare_composite(left: &[u8], right: &[u8]) -> Result<Ordering, TermError> {
    let left = CompositeTerm::parse(left)?;
    let right = CompositeTerm::parse(right)?;

    for (l, r) in left.split().iter().zip(right.split()) {
        let ordering = compare_terms(&IndexTerm::decode(l)?, &IndexTerm::decode(r)?)?;
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
    }

    // tie on the shared prefix: more remaining bytes sorts later
    let shared = left.len().min(right.len());
    let remaining = |t: &CompositeTerm<'_>| {
        t.byte_len() - t.parts[..shared].iter().map(|p| LEN_PREFIX + p.len()).sum::<usize>()
    };

    Ok(remaining(&left).cmp(&remaining(&right)))
}

/// Storage order of any two index terms. Composite terms sort after
/// non-composite ones.
pub fn compare_index_terms(left: &[u8], right: &[u8]) -> Result<Ordering, TermError> {
    match (is_composite(left), is_composite(right)) {
        (true, true) => compare_composite(left, right),
        (true, false) => Ok(Ordering::Greater),
        (false, true) => Ok(Ordering::Less),
        (false, false) => compare_terms(&IndexTerm::decode(left)?, &IndexTerm::decode(right)?),
    }
}

///
/// TESTS
///
