use crate::{
    term::{IndexTerm, TermError},
    value::compare_values,
};
use std::cmp::Ordering;

/// Index order of two single-path terms.
///
/// Metadata terms sort before data terms. Data terms order by path bytes,
/// then value; on a value tie an undefined term sorts first, then a
/// maybe-undefined term, and a truncated term sorts last. Descending terms
/// reverse the result. Mixing directions is an error.
pub fn compare_terms(left: &IndexTerm, right: &IndexTerm) -> Result<Ordering, TermError> {
    if left.is_metadata() != right.is_metadata() {
        return Ok(if left.is_metadata() {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }

    let is_descending = left.is_descending();
    if is_descending != right.is_descending() {
        return Err(TermError::MixedDirection);
    }

    let ordering = compare_path_and_value(left, right);

    Ok(if is_descending {
        ordering.reverse()
    } else {
        ordering
    })
}

fn compare_path_and_value(left: &IndexTerm, right: &IndexTerm) -> Ordering {
    left.path
        .as_bytes()
        .cmp(right.path.as_bytes())
        .then_with(|| compare_values(&left.value, &right.value).ordering)
        // `true` sorts after `false`, so the flagged side goes first
        .then_with(|| right.is_value_undefined().cmp(&left.is_value_undefined()))
        .then_with(|| {
            right
                .is_value_maybe_undefined()
                .cmp(&left.is_value_maybe_undefined())
        })
        .then_with(|| left.is_truncated().cmp(&right.is_truncated()))
}
