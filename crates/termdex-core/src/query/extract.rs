use crate::{
    composite,
    generate::{CartesianProduct, term_groups},
    obs::sink::{self, MetricsEvent},
    options::IndexOptions,
    query::{
        BOUND_PATH, BoundTerm, BoundsSet, CompositeQuery, IndexBounds, QueryError,
        QueryExtraction, QueryPredicate, QueryStrategy, ScanFlags, ScanMeta, ScanState,
        SingleBound, operator::parse_operator_strategy,
    },
    term::{IndexTerm, RootTerm, SerializedTerm, serialize_term},
    value::Value,
};
use std::sync::Arc;
use tracing::trace;

const TARGET: &str = "termdex::query";

/// Largest number of query terms one extraction may produce.
pub const MAX_QUERY_PERMUTATIONS: usize = i32::MAX as usize;

/// Extract the query terms for `query` under `strategy`.
///
/// `CompositeQuery` expects a composite query document and `UniqueEqual`
/// a document of indexed values. The whole-index strategies ignore
/// `query`. Any other strategy expects `{path: value}` and is extracted as
/// a composite query of one predicate.
pub fn extract_query(
    query: &Value,
    strategy: QueryStrategy,
    options: &IndexOptions,
) -> Result<QueryExtraction, QueryError> {
    let extraction = match strategy {
        QueryStrategy::IsMultiKey => root_sentinel(strategy, RootTerm::MultiKey, options)?,
        QueryStrategy::HasTruncatedTerms => root_sentinel(strategy, RootTerm::Truncated, options)?,
        QueryStrategy::HasCorrelatedReducedTerms => {
            root_sentinel(strategy, RootTerm::CorrelatedRootArray, options)?
        }
        QueryStrategy::UniqueEqual => unique_equal(query, options)?,
        QueryStrategy::CompositeQuery => {
            return extract_composite_query(&CompositeQuery::parse(query)?, options);
        }
        single => {
            let Value::Document(fields) = query else {
                return Err(QueryError::ExpectedDocument(query.to_string()));
            };
            let predicates = fields
                .iter()
                .map(|(path, value)| QueryPredicate::new(single, path.clone(), value.clone()))
                .collect();

            return extract_composite_query(&CompositeQuery::new(predicates), options);
        }
    };

    Ok(record(strategy, extraction))
}

/// Extract an already parsed composite query.
pub fn extract_composite_query(
    spec: &CompositeQuery,
    options: &IndexOptions,
) -> Result<QueryExtraction, QueryError> {
    let extraction = composite_query(spec, options)?;

    Ok(record(QueryStrategy::CompositeQuery, extraction))
}

fn record(strategy: QueryStrategy, extraction: QueryExtraction) -> QueryExtraction {
    trace!(
        target: TARGET,
        strategy = strategy.code(),
        terms = extraction.terms.len(),
        permutations = extraction.total_permutations,
        "extracted query terms"
    );
    sink::record(MetricsEvent::QueryExtracted {
        permutations: extraction.total_permutations as u64,
    });

    extraction
}

fn root_sentinel(
    strategy: QueryStrategy,
    root: RootTerm,
    options: &IndexOptions,
) -> Result<QueryExtraction, QueryError> {
    let meta = ScanMeta {
        num_paths: options.path_count(),
        ..ScanMeta::default()
    };
    let state = ScanState::new(
        strategy,
        ScanFlags::default(),
        Arc::from(Vec::new()),
        Arc::new(meta),
    );

    Ok(QueryExtraction {
        terms: vec![root.serialize(&options.composite_metadata())?],
        partial_match: vec![true],
        scan_states: vec![state],
        total_permutations: 1,
    })
}

///
/// ScanKeys
///
/// Variable bound sets grouped by path. Permutation `i` picks one bound
/// per bounded path, first path varying fastest.
///

struct ScanKeys {
    per_path: Vec<Vec<usize>>,
    terms_per_path: Vec<usize>,
    total: usize,
}

impl ScanKeys {
    fn new(sets: &[BoundsSet], num_paths: usize) -> Result<Self, QueryError> {
        let mut per_path = vec![Vec::new(); num_paths];
        let mut terms_per_path = vec![0usize; num_paths];
        for (key, set) in sets.iter().enumerate() {
            per_path[set.path_index].push(key);
            terms_per_path[set.path_index] += set.bounds.len();
        }

        let total = if sets.iter().any(|s| s.bounds.is_empty()) {
            0
        } else {
            terms_per_path
                .iter()
                .filter(|n| **n > 0)
                .try_fold(1usize, |acc, n| acc.checked_mul(*n))
                .filter(|total| *total <= MAX_QUERY_PERMUTATIONS)
                .ok_or(QueryError::TooManyPermutations {
                    max: MAX_QUERY_PERMUTATIONS,
                })?
        };

        Ok(Self {
            per_path,
            terms_per_path,
            total,
        })
    }

    fn has_multiple_per_path(&self) -> bool {
        self.per_path.iter().any(|keys| keys.len() > 1)
    }

    // (scan key, bound index) per bounded path for permutation `index`.
    fn locate(
        &self,
        sets: &[BoundsSet],
        index: usize,
    ) -> Result<Vec<(usize, usize)>, QueryError> {
        let mut remaining = index;
        let mut picks = Vec::new();

        for (keys, count) in self.per_path.iter().zip(&self.terms_per_path) {
            if *count == 0 {
                continue;
            }
            let mut offset = remaining % count;
            remaining /= count;

            let mut found = None;
            for key in keys {
                let len = sets[*key].bounds.len();
                if offset < len {
                    found = Some((*key, offset));
                    break;
                }
                offset -= len;
            }
            picks.push(found.ok_or(QueryError::ScanKeyNotFound)?);
        }

        Ok(picks)
    }
}

fn composite_query(
    spec: &CompositeQuery,
    options: &IndexOptions,
) -> Result<QueryExtraction, QueryError> {
    let num_paths = options.path_count();
    let mut sets = Vec::new();
    for predicate in &spec.predicates {
        parse_operator_strategy(
            options,
            &predicate.path,
            &predicate.value,
            predicate.strategy,
            &mut sets,
        )?;
    }

    let mut fixed = vec![IndexBounds::default(); num_paths];
    let mut requires_recheck = false;
    let wildcard = options.wildcard_path_index();
    if wildcard.is_some() {
        if !spec.is_multikey {
            merge_single_variable_bounds(&mut sets, &mut fixed, wildcard);
        }
        if spec.is_ordered {
            requires_recheck |= pick_variable_bounds_for_ordered_scan(&mut sets);
        }
    } else {
        if spec.is_correlated && options.enable_reduced_correlated_terms {
            trim_secondary_variable_bounds(&mut sets);
            requires_recheck = true;
        }
        if !spec.is_multikey {
            merge_single_variable_bounds(&mut sets, &mut fixed, None);
        } else if spec.is_ordered {
            requires_recheck |= pick_variable_bounds_for_ordered_scan(&mut sets);
        }
    }

    let keys = ScanKeys::new(&sets, num_paths)?;
    let permutations = keys.total;

    let mut run = PermutationRun {
        options,
        is_backward: spec.is_backward,
        requires_recheck,
        has_truncation: false,
    };
    let mut scan_key_map = vec![Vec::new(); sets.len()];
    let mut terms = Vec::with_capacity(permutations + 1);
    let mut partial_match = Vec::with_capacity(permutations + 1);
    let mut permutation_bounds = Vec::with_capacity(permutations);

    for index in 0..permutations {
        let mut bounds = fixed.clone();
        for (key, offset) in keys.locate(&sets, index)? {
            let set = &sets[key];
            scan_key_map[key].push(index);
            bounds[set.path_index].merge(&set.bounds[offset]);
        }

        let (term, is_partial) = run.build_term(&mut bounds)?;
        terms.push(term);
        partial_match.push(is_partial);
        permutation_bounds.push(bounds);
    }

    let mut truncation_term_index = None;
    if run.has_truncation && !spec.is_ordered {
        truncation_term_index = Some(terms.len());
        terms.push(RootTerm::Truncated.serialize(&options.composite_metadata())?);
        partial_match.push(false);
    }

    let flags = ScanFlags {
        is_backward: spec.is_backward,
        has_truncation: run.has_truncation,
        has_multiple_scan_keys_per_path: keys.has_multiple_per_path(),
        requires_runtime_recheck: run.requires_recheck,
    };
    let meta = Arc::new(ScanMeta {
        num_paths,
        has_wildcard: wildcard.is_some(),
        scan_key_map,
        truncation_term_index,
    });
    let scan_states = permutation_bounds
        .into_iter()
        .map(|bounds| {
            ScanState::new(
                QueryStrategy::CompositeQuery,
                flags,
                Arc::from(bounds),
                Arc::clone(&meta),
            )
        })
        .collect();

    Ok(QueryExtraction {
        terms,
        partial_match,
        scan_states,
        total_permutations: permutations,
    })
}

// Fold single-bound sets into the fixed bounds of their path. Wildcard
// sets fold only when every one of them targets the same query path.
fn merge_single_variable_bounds(
    sets: &mut Vec<BoundsSet>,
    fixed: &mut [IndexBounds],
    wildcard: Option<usize>,
) {
    let wildcard_mergeable = wildcard.is_none_or(|w| {
        let mut paths = sets
            .iter()
            .filter(|s| s.path_index == w)
            .flat_map(|s| s.bounds.iter().map(|b| b.query_path.as_deref()));
        let first = paths.next();
        paths.all(|p| p == first.flatten())
    });

    sets.retain(|set| {
        if set.bounds.len() != 1 || (Some(set.path_index) == wildcard && !wildcard_mergeable) {
            return true;
        }
        fixed[set.path_index].merge(&set.bounds[0]);
        false
    });
}

// Keep one set per path, preferring a point equality. Returns whether
// any set was dropped.
fn pick_variable_bounds_for_ordered_scan(sets: &mut Vec<BoundsSet>) -> bool {
    let mut chosen: Vec<(usize, usize)> = Vec::new();
    let mut dropped = false;

    for (key, set) in sets.iter().enumerate() {
        match chosen.iter_mut().find(|(path, _)| *path == set.path_index) {
            Some(slot) => {
                dropped = true;
                if !sets[slot.1].is_single_equality() && set.is_single_equality() {
                    slot.1 = key;
                }
            }
            None => chosen.push((set.path_index, key)),
        }
    }

    if dropped {
        let keep: Vec<usize> = chosen.iter().map(|(_, key)| *key).collect();
        let mut key = 0;
        sets.retain(|_| {
            let kept = keep.contains(&key);
            key += 1;
            kept
        });
    }

    dropped
}

// Correlated terms pair values of one array element only; bounds beyond
// the first path would reject documents that match across elements.
fn trim_secondary_variable_bounds(sets: &mut Vec<BoundsSet>) {
    sets.retain(|set| set.path_index == 0);
}

///
/// PermutationRun
///
/// Flags accumulated while building every permutation's term.
///

struct PermutationRun<'a> {
    options: &'a IndexOptions,
    is_backward: bool,
    requires_recheck: bool,
    has_truncation: bool,
}

impl PermutationRun<'_> {
    // Encode every bound, then assemble the term the scan starts from.
    fn build_term(&mut self, bounds: &mut [IndexBounds]) -> Result<(SerializedTerm, bool), QueryError> {
        let mut sub_terms = Vec::with_capacity(bounds.len());
        let mut is_partial = false;

        for (i, path_bounds) in bounds.iter_mut().enumerate() {
            let indexed = &self.options.paths[i];
            let metadata = self.options.bound_metadata(i);
            let path = if indexed.is_wildcard {
                path_bounds.query_path.clone().unwrap_or_default()
            } else {
                BOUND_PATH.to_string()
            };

            for bound in [&mut path_bounds.lower, &mut path_bounds.upper]
                .into_iter()
                .flatten()
            {
                self.has_truncation |= bound.prepare(&path, &metadata)?;
            }
            self.requires_recheck |= path_bounds.requires_recheck;

            path_bounds.is_equality = path_bounds.is_point();
            if path_bounds.is_equality {
                if let Some(BoundTerm { serialized, .. }) =
                    path_bounds.lower.as_ref().and_then(|b| b.term.as_ref())
                {
                    sub_terms.push(serialized.clone());
                    continue;
                }
            }

            is_partial = true;
            let use_upper = indexed.is_descending != self.is_backward;
            let start = if use_upper {
                &path_bounds.upper
            } else {
                &path_bounds.lower
            };
            let term = match start.as_ref().and_then(|b| b.term.as_ref()) {
                Some(term) => term.serialized.clone(),
                None => {
                    let sentinel = if use_upper { Value::MaxKey } else { Value::MinKey };
                    let placeholder = if indexed.is_wildcard { "" } else { BOUND_PATH };
                    let metadata = self
                        .options
                        .composite_metadata()
                        .with_descending(indexed.is_descending);
                    serialize_term(placeholder, &sentinel, &metadata)?
                }
            };
            sub_terms.push(term);
        }

        Ok((composite::assemble(&sub_terms)?, is_partial))
    }
}

// Equality on every generated combination of the query document's values.
fn unique_equal(query: &Value, options: &IndexOptions) -> Result<QueryExtraction, QueryError> {
    if !query.is_document() {
        return Err(QueryError::ExpectedDocument(query.to_string()));
    }

    let grouped = term_groups(query, options)?;
    let num_paths = options.path_count();
    let mut terms = Vec::new();
    let mut partial_match = Vec::new();
    let mut permutation_bounds = Vec::new();
    let mut has_truncation = false;
    let mut has_nulls = false;

    for group in &grouped.groups {
        let refs: Vec<Vec<&SerializedTerm>> = group.iter().map(|p| p.iter().collect()).collect();
        let product = CartesianProduct::new(&refs)?;

        for combination in product.iter() {
            let mut sub_terms = Vec::with_capacity(num_paths);
            let mut bounds = Vec::with_capacity(num_paths);
            let mut is_partial = false;

            for (i, term) in combination.into_iter().enumerate() {
                let indexed = &options.paths[i];
                let decoded = IndexTerm::decode(term.as_bytes())?;
                has_truncation |= decoded.is_truncated();
                let query_path = indexed.is_wildcard.then(|| decoded.path.clone());

                if decoded.is_value_undefined()
                    || decoded.is_value_maybe_undefined()
                    || decoded.value.is_null()
                {
                    is_partial = true;
                    has_nulls = true;

                    let metadata = options
                        .composite_metadata()
                        .with_descending(indexed.is_descending);
                    let mut lower = SingleBound::exclusive(Value::MinKey);
                    let mut upper = SingleBound::inclusive(Value::Null);
                    lower.prepare(&decoded.path, &metadata)?;
                    upper.prepare(&decoded.path, &metadata)?;

                    sub_terms.push(serialize_term(&decoded.path, &Value::MinKey, &metadata)?);
                    bounds.push(IndexBounds {
                        lower: Some(lower),
                        upper: Some(upper),
                        requires_recheck: true,
                        query_path,
                        ..IndexBounds::default()
                    });
                } else {
                    let point = SingleBound {
                        value: decoded.value.clone(),
                        is_inclusive: true,
                        term: Some(BoundTerm {
                            serialized: term.clone(),
                            decoded,
                        }),
                    };
                    sub_terms.push(term.clone());
                    bounds.push(IndexBounds {
                        lower: Some(point.clone()),
                        upper: Some(point),
                        is_equality: true,
                        query_path,
                        ..IndexBounds::default()
                    });
                }
            }

            terms.push(composite::assemble(&sub_terms)?);
            partial_match.push(is_partial);
            permutation_bounds.push(bounds);
        }
    }

    let flags = ScanFlags {
        has_truncation,
        requires_runtime_recheck: has_truncation || has_nulls,
        ..ScanFlags::default()
    };
    let meta = Arc::new(ScanMeta {
        num_paths,
        has_wildcard: options.has_wildcard(),
        ..ScanMeta::default()
    });
    let total_permutations = terms.len();
    let scan_states = permutation_bounds
        .into_iter()
        .map(|bounds| {
            ScanState::new(
                QueryStrategy::UniqueEqual,
                flags,
                Arc::from(bounds),
                Arc::clone(&meta),
            )
        })
        .collect();

    Ok(QueryExtraction {
        terms,
        partial_match,
        scan_states,
        total_permutations,
    })
}
