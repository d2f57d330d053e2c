//! Per-patch-pair accumulation.
//!
//! When the input catalogs are split into spatial patches, each pair of
//! patches `(i, j)` produces its own partial result. We hold onto all of
//! them (in a [`ResultStore`]) so that the resampling covariance estimators
//! can recombine them without repeating the pair counting.

use binnedcorr_nostd_internal::{add_assign_elementwise, any_nonzero};
use std::collections::{BTreeSet, HashMap};

use crate::Error;

/// Identifies the patch of the first catalog (`i`) and of the second
/// catalog (`j`) that produced a partial result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchKey {
    pub i: usize,
    pub j: usize,
}

impl PatchKey {
    pub fn new(i: usize, j: usize) -> Self {
        PatchKey { i, j }
    }

    /// whether a patch is paired with itself
    pub fn is_auto(&self) -> bool {
        self.i == self.j
    }
}

impl From<(usize, usize)> for PatchKey {
    fn from((i, j): (usize, usize)) -> Self {
        PatchKey { i, j }
    }
}

impl core::fmt::Display for PatchKey {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "({}, {})", self.i, self.j)
    }
}

/// A (partial) correlation result: the unnormalized statistic and the
/// weight of every bin.
///
/// Results with several named statistics (e.g. xi+ and xi- for shear) are
/// flattened into a single vector, one statistic after the other. Copying is
/// done with [`Clone`].
#[derive(Clone, Debug, PartialEq)]
pub struct PatchResult {
    stat: Vec<f64>,
    weight: Vec<f64>,
}

impl PatchResult {
    /// an all-zero result with `len` entries
    pub fn zeros(len: usize) -> Self {
        PatchResult {
            stat: vec![0.0; len],
            weight: vec![0.0; len],
        }
    }

    pub fn from_parts(stat: Vec<f64>, weight: Vec<f64>) -> Result<Self, Error> {
        if stat.len() != weight.len() {
            return Err(Error::internal_config("stat and weight must have the same length"));
        }
        Ok(PatchResult { stat, weight })
    }

    pub fn len(&self) -> usize {
        self.stat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stat.is_empty()
    }

    pub fn stat(&self) -> &[f64] {
        &self.stat
    }

    pub fn weight(&self) -> &[f64] {
        &self.weight
    }

    pub fn stat_mut(&mut self) -> &mut [f64] {
        &mut self.stat
    }

    pub fn weight_mut(&mut self) -> &mut [f64] {
        &mut self.weight
    }

    /// whether any bin holds nonzero weight
    pub fn has_weight(&self) -> bool {
        any_nonzero(&self.weight)
    }

    /// zero every entry
    pub fn clear(&mut self) {
        self.stat.fill(0.0);
        self.weight.fill(0.0);
    }

    /// Add `other` into `self`, elementwise.
    ///
    /// This is the only way results are combined, so the combined value
    /// never depends on the order in which results are merged.
    pub fn merge(&mut self, other: &PatchResult) -> Result<(), Error> {
        add_assign_elementwise(&mut self.stat, &other.stat).map_err(Error::internal)?;
        add_assign_elementwise(&mut self.weight, &other.weight).map_err(Error::internal)
    }
}

/// Maps each [`PatchKey`] to its accumulated [`PatchResult`].
///
/// The store only ever grows through [`ResultStore::merge`] (or is wiped
/// entirely by [`ResultStore::reset`]). A key with no entry is equivalent to
/// an all-zero result.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultStore {
    stat_len: usize,
    results: HashMap<PatchKey, PatchResult>,
}

impl ResultStore {
    /// create an empty store whose results all have `stat_len` entries
    pub fn new(stat_len: usize) -> Self {
        ResultStore {
            stat_len,
            results: HashMap::new(),
        }
    }

    pub fn stat_len(&self) -> usize {
        self.stat_len
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, key: &PatchKey) -> Option<&PatchResult> {
        self.results.get(key)
    }

    pub fn contains_key(&self, key: &PatchKey) -> bool {
        self.results.contains_key(key)
    }

    /// every key, in sorted order
    pub fn sorted_keys(&self) -> Vec<PatchKey> {
        let mut keys: Vec<PatchKey> = self.results.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PatchKey, &PatchResult)> {
        self.results.iter()
    }

    /// Merge `result` into the entry for `key` (inserting it when there is
    /// no entry yet).
    pub fn merge(&mut self, key: PatchKey, result: &PatchResult) -> Result<(), Error> {
        if result.len() != self.stat_len {
            return Err(Error::stat_len(key, self.stat_len, result.len()));
        }
        match self.results.get_mut(&key) {
            Some(existing) => existing.merge(result),
            None => {
                self.results.insert(key, result.clone());
                Ok(())
            }
        }
    }

    /// The merge of every stored result.
    ///
    /// We fold the entries in sorted key order, so repeated calls give
    /// bitwise identical answers.
    pub fn combined_total(&self) -> PatchResult {
        let mut total = PatchResult::zeros(self.stat_len);
        for key in self.sorted_keys() {
            let partial = &self.results[&key];
            for (dst, src) in total.stat.iter_mut().zip(partial.stat.iter()) {
                *dst += *src;
            }
            for (dst, src) in total.weight.iter_mut().zip(partial.weight.iter()) {
                *dst += *src;
            }
        }
        total
    }

    /// Discard every entry (this is only meant for restarting an
    /// accumulation run from scratch).
    pub fn reset(&mut self) {
        self.results.clear();
    }

    /// Returns `(n1, n2)`: the number of distinct patches of the first and
    /// second catalog.
    ///
    /// Fails unless the first (second) indices form the contiguous range
    /// `0..n1` (`0..n2`). An empty store gives `(0, 0)`.
    pub fn patch_counts(&self) -> Result<(usize, usize), Error> {
        let firsts: BTreeSet<usize> = self.results.keys().map(|k| k.i).collect();
        let seconds: BTreeSet<usize> = self.results.keys().map(|k| k.j).collect();
        Ok((
            contiguous_count(1, &firsts)?,
            contiguous_count(2, &seconds)?,
        ))
    }
}

fn contiguous_count(axis: u8, indices: &BTreeSet<usize>) -> Result<usize, Error> {
    let n = indices.len();
    match indices.last() {
        Some(&last) if last + 1 != n => Err(Error::patch_index_gap(
            axis,
            n,
            indices.iter().copied().collect(),
        )),
        _ => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(stat: &[f64], weight: &[f64]) -> PatchResult {
        PatchResult::from_parts(stat.to_vec(), weight.to_vec()).unwrap()
    }

    #[test]
    fn merge_and_clear() {
        let mut a = result(&[1.0, 2.0], &[1.0, 0.0]);
        a.merge(&result(&[3.0, 4.0], &[2.0, 5.0])).unwrap();
        assert_eq!(a.stat(), &[4.0, 6.0]);
        assert_eq!(a.weight(), &[3.0, 5.0]);
        assert!(a.has_weight());

        assert!(a.merge(&PatchResult::zeros(3)).is_err());

        a.clear();
        assert_eq!(a, PatchResult::zeros(2));
        assert!(!a.has_weight());
    }

    #[test]
    fn mismatched_parts() {
        let err = PatchResult::from_parts(vec![1.0], vec![]).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Configuration);
    }

    #[test]
    fn store_merges_into_existing() {
        let mut store = ResultStore::new(1);
        let key = PatchKey::new(0, 1);
        store.merge(key, &result(&[1.0], &[2.0])).unwrap();
        store.merge(key, &result(&[3.0], &[4.0])).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key).unwrap(), &result(&[4.0], &[6.0]));

        let err = store.merge(key, &PatchResult::zeros(2)).unwrap_err();
        assert!(err.to_string().contains("(0, 1)"));
    }

    #[test]
    fn patch_counts() {
        let mut store = ResultStore::new(1);
        assert_eq!(store.patch_counts().unwrap(), (0, 0));

        for (i, j) in [(0, 0), (1, 0), (2, 0)] {
            store.merge(PatchKey::new(i, j), &result(&[1.0], &[1.0])).unwrap();
        }
        assert_eq!(store.patch_counts().unwrap(), (3, 1));

        store.merge(PatchKey::new(5, 0), &result(&[1.0], &[1.0])).unwrap();
        assert!(store.patch_counts().is_err());

        store.reset();
        assert!(store.is_empty());
    }
}
