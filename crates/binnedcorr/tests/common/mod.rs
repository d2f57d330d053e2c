// the reason this is named mod.rs has to do with some complexities of how
// testing is handled
//
// we are following the advice of the rust book
// https://doc.rust-lang.org/book/ch11-03-test-organization.html#submodules-in-integration-tests

// not every test file uses every helper
#![allow(dead_code)]

use binnedcorr::{PairCounter, PatchKey, PatchResult, ResultStore, TraversalParams};
use rand::distr::{Distribution, Uniform};
use rand_xoshiro::Xoshiro256PlusPlus;
use rand_xoshiro::rand_core::SeedableRng;
use std::collections::HashMap;

// based on numpy!
// https://numpy.org/doc/stable/reference/generated/numpy.isclose.html
pub fn isclose(actual: f64, ref_val: f64, rtol: f64, atol: f64) -> bool {
    let actual_nan = actual.is_nan();
    let ref_nan = ref_val.is_nan();
    if actual_nan || ref_nan {
        actual_nan && ref_nan
    } else {
        (actual - ref_val).abs() <= (atol + rtol * ref_val.abs())
    }
}

/// route log records to the test harness (safe to call from every test)
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn result(stat: &[f64], weight: &[f64]) -> PatchResult {
    PatchResult::from_parts(stat.to_vec(), weight.to_vec()).unwrap()
}

/// a result with integer-valued entries (so that sums are exact)
pub fn random_result(rng: &mut Xoshiro256PlusPlus, len: usize) -> PatchResult {
    let stat_dist = Uniform::try_from(-5..10).unwrap();
    let weight_dist = Uniform::try_from(1..6).unwrap();
    let stat: Vec<f64> = (0..len).map(|_| stat_dist.sample(rng) as f64).collect();
    let weight: Vec<f64> = (0..len).map(|_| weight_dist.sample(rng) as f64).collect();
    result(&stat, &weight)
}

/// Random results for every `(i, j)` with `i <= j < npatch` (the keys an
/// auto-correlation records when every patch pair holds weight).
pub fn random_auto_results(
    npatch: usize,
    stat_len: usize,
    seed: u64,
) -> Vec<(PatchKey, PatchResult)> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut out = Vec::new();
    for i in 0..npatch {
        for j in i..npatch {
            out.push((PatchKey::new(i, j), random_result(&mut rng, stat_len)));
        }
    }
    out
}

pub fn build_store<'a>(
    stat_len: usize,
    entries: impl IntoIterator<Item = &'a (PatchKey, PatchResult)>,
) -> ResultStore {
    let mut store = ResultStore::new(stat_len);
    for (key, result) in entries {
        store.merge(*key, result).unwrap();
    }
    store
}

/// A stand-in for a spatial index: it hands back precomputed results and
/// records which pairs it was asked about.
pub struct TableCounter {
    pub table: HashMap<(usize, usize), PatchResult>,
    pub stat_len: usize,
    pub visited: Vec<(usize, usize)>,
    pub skipped: Vec<PatchResult>,
}

impl TableCounter {
    pub fn new(stat_len: usize, entries: &[(PatchKey, PatchResult)]) -> Self {
        TableCounter {
            table: entries
                .iter()
                .map(|(k, r)| ((k.i, k.j), r.clone()))
                .collect(),
            stat_len,
            visited: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn lookup(&mut self, i: usize, j: usize) -> PatchResult {
        self.visited.push((i, j));
        self.table
            .get(&(i, j))
            .cloned()
            .unwrap_or_else(|| PatchResult::zeros(self.stat_len))
    }
}

impl PairCounter for TableCounter {
    fn count_auto(&mut self, patch: usize, _params: &TraversalParams) -> PatchResult {
        self.lookup(patch, patch)
    }

    fn count_cross(&mut self, i: usize, j: usize, _params: &TraversalParams) -> PatchResult {
        self.lookup(i, j)
    }

    fn add_total(&mut self, skipped: &PatchResult) {
        self.skipped.push(skipped.clone());
    }
}
