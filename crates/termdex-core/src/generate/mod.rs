//! Module: generate
//! Responsibility: the full set of index terms stored for one document.
//! Does not own: single-term encoding or composite byte layout.
//! Boundary: write-path entry point; consumes `IndexOptions` read-only.

mod product;
pub(crate) mod traverse;

#[cfg(test)]
mod tests;

use crate::{
    composite,
    error::{ErrorClass, ErrorOrigin, InternalError},
    obs::sink::{self, MetricsEvent},
    options::{IndexOptions, OptionsError},
    term::{
        RootTerm, SerializedTerm, TermCreateMetadata, TermError, TermMetadata, serialize_term,
        serialize_term_with_metadata,
    },
    value::Value,
};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;
use tracing::trace;
use traverse::{Anchor, Leaf};

pub use product::CartesianProduct;

const TARGET: &str = "termdex::generate";

///
/// GenerateError
///

#[derive(Debug, ThisError)]
pub enum GenerateError {
    #[error("document expands to more than {max} index terms")]
    TooManyTerms { max: usize },

    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    Term(#[from] TermError),
}

impl From<GenerateError> for InternalError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::TooManyTerms { .. } => {
                Self::new(ErrorClass::Encoding, ErrorOrigin::Generate, err.to_string())
            }
            GenerateError::Options(inner) => inner.into(),
            GenerateError::Term(inner) => {
                Self::new(inner.class(), ErrorOrigin::Generate, inner.to_string())
            }
        }
    }
}

///
/// DocumentTermSet
///
/// Terms to store for one document, primary terms first and sentinels
/// last.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DocumentTermSet {
    pub terms: Vec<SerializedTerm>,
    pub has_multi_key: bool,
    pub has_truncation: bool,
    pub is_correlated: bool,
}

impl DocumentTermSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Raw term bytes, in generation order.
    pub fn iter_bytes(&self) -> impl Iterator<Item = &[u8]> {
        self.terms.iter().map(SerializedTerm::as_bytes)
    }
}

// Encoded terms of one indexed path.
struct PathTerms {
    terms: Vec<AnchoredTerm>,
    undefined: SerializedTerm,
    has_array_values: bool,
}

struct AnchoredTerm {
    term: SerializedTerm,
    anchor: Option<Anchor>,
}

impl PathTerms {
    fn all(&self) -> Vec<&SerializedTerm> {
        if self.terms.is_empty() {
            vec![&self.undefined]
        } else {
            self.terms.iter().map(|t| &t.term).collect()
        }
    }

    fn reached_through(&self, array_path: &str) -> bool {
        self.terms
            .iter()
            .any(|t| t.anchor.as_ref().is_some_and(|a| a.array_path == array_path))
    }

    fn in_element(&self, array_path: &str, element: usize) -> Vec<&SerializedTerm> {
        let terms: Vec<&SerializedTerm> = self
            .terms
            .iter()
            .filter(|t| {
                t.anchor
                    .as_ref()
                    .is_some_and(|a| a.array_path == array_path && a.element == element)
            })
            .map(|t| &t.term)
            .collect();

        if terms.is_empty() {
            vec![&self.undefined]
        } else {
            terms
        }
    }
}

/// Generate every term stored for `document`.
///
/// With `add_metadata_terms`, sentinel terms flag documents that are
/// multi-key or carry a truncated term.
pub fn generate_terms(
    document: &Value,
    options: &IndexOptions,
    add_metadata_terms: bool,
) -> Result<DocumentTermSet, GenerateError> {
    let grouped = term_groups(document, options)?;
    let has_array_values = grouped.has_array_values;

    let mut set = DocumentTermSet {
        is_correlated: grouped.is_correlated,
        ..DocumentTermSet::default()
    };

    for group in &grouped.groups {
        let refs: Vec<Vec<&SerializedTerm>> = group.iter().map(|p| p.iter().collect()).collect();
        append_product(&mut set, &refs)?;
    }
    if set.is_correlated {
        set.terms
            .push(RootTerm::CorrelatedRootArray.serialize(&options.composite_metadata())?);
    }

    let primary_count = set.terms.len() - usize::from(set.is_correlated);
    if add_metadata_terms {
        let consider_multi_term_as_multi_key = !options.has_wildcard();
        set.has_multi_key =
            (consider_multi_term_as_multi_key && primary_count > 1) || has_array_values;

        if set.has_multi_key {
            set.terms
                .push(RootTerm::MultiKey.serialize(&options.composite_metadata())?);
        }
        if set.has_truncation {
            set.terms
                .push(RootTerm::Truncated.serialize(&options.composite_metadata())?);
        }
    } else {
        set.has_multi_key = has_array_values;
    }

    trace!(
        target: TARGET,
        primary = primary_count,
        total = set.terms.len(),
        multi_key = set.has_multi_key,
        truncated = set.has_truncation,
        correlated = set.is_correlated,
        "generated document terms"
    );
    sink::record(MetricsEvent::TermsGenerated {
        terms: set.terms.len() as u64,
        has_truncation: set.has_truncation,
    });

    Ok(set)
}

/// Terms for a unique-index key spec `{path: order, ...}`: no size limit,
/// no sentinel terms, correlated generation enabled.
pub fn generate_terms_from_key_spec(
    document: &Value,
    key_spec: &Value,
) -> Result<DocumentTermSet, GenerateError> {
    let options = IndexOptions::from_key_spec(key_spec)?.with_reduced_correlated_terms(true);

    generate_terms(document, &options, false)
}

///
/// TermGroups
///
/// Per-path term lists whose products make up the primary terms: one
/// group per correlated array element, or a single global group.
///

pub(crate) struct TermGroups {
    pub groups: Vec<Vec<Vec<SerializedTerm>>>,
    pub has_array_values: bool,
    pub is_correlated: bool,
}

pub(crate) fn term_groups(
    document: &Value,
    options: &IndexOptions,
) -> Result<TermGroups, GenerateError> {
    let paths = (0..options.paths.len())
        .map(|i| encode_path(document, options, i))
        .collect::<Result<Vec<_>, _>>()?;

    let correlated = if options.enable_reduced_correlated_terms {
        correlated_array(&paths)
    } else {
        None
    };

    let owned = |terms: Vec<&SerializedTerm>| terms.into_iter().cloned().collect::<Vec<_>>();
    let groups = match &correlated {
        Some((array_path, elements)) => elements
            .iter()
            .map(|element| {
                paths
                    .iter()
                    .map(|p| {
                        if p.reached_through(array_path) {
                            owned(p.in_element(array_path, *element))
                        } else {
                            owned(p.all())
                        }
                    })
                    .collect()
            })
            .collect(),
        None => vec![paths.iter().map(|p| owned(p.all())).collect()],
    };

    Ok(TermGroups {
        groups,
        has_array_values: paths.iter().any(|p| p.has_array_values),
        is_correlated: correlated.is_some(),
    })
}

fn append_product(
    set: &mut DocumentTermSet,
    sets: &[Vec<&SerializedTerm>],
) -> Result<(), GenerateError> {
    let product = CartesianProduct::new(sets)?;
    set.terms.reserve(product.len());

    for combination in product.iter() {
        let term = composite::assemble(&combination)?;
        set.has_truncation |= term.is_truncated;
        set.terms.push(term);
    }

    Ok(())
}

fn encode_path(
    document: &Value,
    options: &IndexOptions,
    index: usize,
) -> Result<PathTerms, GenerateError> {
    let indexed = &options.paths[index];
    let metadata = options.path_metadata(index);
    let matches = traverse::collect(document, indexed);

    let terms = matches
        .occurrences
        .into_iter()
        .map(|occurrence| {
            let term = match occurrence.leaf {
                Leaf::Value(value) => serialize_term(&occurrence.path, value, &metadata)?,
                Leaf::Undefined => RootTerm::ValueUndefined.serialize(&metadata)?,
                Leaf::MaybeUndefined => RootTerm::ValueMaybeUndefined.serialize(&metadata)?,
            };

            Ok(AnchoredTerm {
                term,
                anchor: occurrence.anchor,
            })
        })
        .collect::<Result<Vec<_>, TermError>>()?;

    Ok(PathTerms {
        terms,
        undefined: undefined_term(options, &metadata)?,
        has_array_values: matches.has_array_values,
    })
}

// Placeholder for a path with no value. Wildcard paths carry no
// path-based undefined term; theirs sits at the empty root path.
fn undefined_term(
    options: &IndexOptions,
    metadata: &TermCreateMetadata,
) -> Result<SerializedTerm, TermError> {
    if metadata.is_wildcard {
        let root = options
            .composite_metadata()
            .with_descending(metadata.is_descending);
        return serialize_term_with_metadata(
            "",
            &Value::Undefined,
            &root,
            TermMetadata::UndefinedValue,
        );
    }

    RootTerm::ValueUndefined.serialize(metadata)
}

// Array of documents to regroup by, with the element positions that
// produced terms. The first array shared by two or more indexed paths wins;
// otherwise the first array any path reached.
fn correlated_array(paths: &[PathTerms]) -> Option<(String, Vec<usize>)> {
    let mut candidates: Vec<&str> = Vec::new();
    for anchor in paths.iter().flat_map(|p| p.terms.iter().filter_map(|t| t.anchor.as_ref())) {
        if !candidates.contains(&anchor.array_path.as_str()) {
            candidates.push(&anchor.array_path);
        }
    }

    let array_path = candidates
        .iter()
        .copied()
        .find(|candidate| paths.iter().filter(|p| p.reached_through(candidate)).count() >= 2)
        .or_else(|| candidates.first().copied())?;

    let elements: BTreeSet<usize> = paths
        .iter()
        .flat_map(|p| p.terms.iter().filter_map(|t| t.anchor.as_ref()))
        .filter(|a| a.array_path == array_path)
        .map(|a| a.element)
        .collect();

    Some((array_path.to_string(), elements.into_iter().collect()))
}
