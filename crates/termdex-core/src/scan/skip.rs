use crate::{
    composite::{self, CompositeTerm},
    options::IndexOptions,
    query::ScanState,
    scan::{BoundsWalk, ScanDecision, ScanError, check_path_count},
    term::{IndexTerm, SerializedTerm, TermCreateMetadata, TermError, serialize_term},
    value::Value,
};

/// Seek term for a candidate that `compare_partial` answered with a skip.
///
/// Paths before the failing one keep the candidate's sub-terms. The failing
/// path moves to its bound (`SkipToBound`) or past every entry sharing the
/// candidate's value (`SkipPastEquality`); later paths move to the start of
/// their sort order. Returns `None` when no path asks for a skip.
pub fn skip_transform(
    candidate: &[u8],
    state: &ScanState,
    options: &IndexOptions,
) -> Result<Option<SerializedTerm>, ScanError> {
    let composite = CompositeTerm::from_stored(candidate)?;
    let parts = composite.split();
    check_path_count(parts.len(), state)?;

    let terms = composite.decode_all()?;
    let mut walk = BoundsWalk::new(state);
    let Some((skip_index, to_bound)) = terms
        .iter()
        .zip(state.bounds.iter())
        .enumerate()
        .find_map(|(i, (term, bounds))| match walk.compare(bounds, term) {
            ScanDecision::SkipToBound => Some((i, true)),
            ScanDecision::SkipPastEquality => Some((i, false)),
            _ => None,
        })
    else {
        return Ok(None);
    };

    let mut seek = Vec::with_capacity(parts.len());
    for (i, (part, term)) in parts.iter().zip(&terms).enumerate() {
        let is_descending = term.is_descending();
        let sub_term = if i < skip_index {
            SerializedTerm {
                bytes: part.to_vec(),
                is_truncated: term.is_truncated(),
                is_root_metadata: false,
            }
        } else if i == skip_index && to_bound {
            let bounds = &state.bounds[i];
            let bound = if is_descending {
                &bounds.upper
            } else {
                &bounds.lower
            };
            match bound.as_ref().and_then(|b| b.term.as_ref()) {
                Some(bound_term) => bound_term.serialized.clone(),
                None => sentinel(term, !is_descending, options)?,
            }
        } else if i == skip_index {
            sentinel(term, is_descending, options)?
        } else {
            sentinel(term, !is_descending, options)?
        };
        seek.push(sub_term);
    }

    Ok(Some(composite::assemble(&seek)?))
}

// MinKey or MaxKey at the candidate's stored path, in its direction.
fn sentinel(
    term: &IndexTerm,
    use_min: bool,
    options: &IndexOptions,
) -> Result<SerializedTerm, TermError> {
    let value = if use_min { Value::MinKey } else { Value::MaxKey };
    let metadata = TermCreateMetadata {
        size_limit: options.path_size_limit(),
        ..options.composite_metadata()
    }
    .with_descending(term.is_descending());

    serialize_term(&term.path, &value, &metadata)
}
