use crate::generate::GenerateError;

/// Largest term count a single generation may produce.
pub const MAX_GENERATED_TERMS: usize = i32::MAX as usize;

///
/// CartesianProduct
///
/// Lazy cartesian product over per-path term sets. Combination `i` is
/// decoded by division with the last set varying fastest, so the first
/// path varies slowest.
///

#[derive(Clone, Copy, Debug)]
pub struct CartesianProduct<'s, T> {
    sets: &'s [Vec<T>],
    len: usize,
}

impl<'s, T: Copy> CartesianProduct<'s, T> {
    pub fn new(sets: &'s [Vec<T>]) -> Result<Self, GenerateError> {
        let len = sets
            .iter()
            .try_fold(1usize, |acc, set| acc.checked_mul(set.len()))
            .filter(|len| *len <= MAX_GENERATED_TERMS)
            .ok_or(GenerateError::TooManyTerms {
                max: MAX_GENERATED_TERMS,
            })?;

        Ok(Self { sets, len })
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Combination at `index`, one element per set.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Vec<T>> {
        if index >= self.len {
            return None;
        }

        let mut remaining = index;
        let mut combination = vec![None; self.sets.len()];
        for (slot, set) in combination.iter_mut().zip(self.sets).rev() {
            *slot = Some(set[remaining % set.len()]);
            remaining /= set.len();
        }

        combination.into_iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Vec<T>> + '_ {
        (0..self.len).filter_map(|i| self.get(i))
    }
}

///
/// TESTS
///
