//! Covariance estimation from per-patch results.
//!
//! Apart from the shot-noise estimate, every method follows the same recipe:
//! 1. define a set of logical samples, each a (multi)set of [`PatchKey`]s
//! 2. sum the stat and weight of each sample's partial results into the
//!    rows of a design matrix ([`make_design_matrix`])
//! 3. take the per-sample estimate `v = vnum / vdenom`
//! 4. contract the centered estimates into a covariance matrix
//!
//! The methods only differ in step 1 and in the scale (and row weights) of
//! step 4.

use binnedcorr_nostd_internal::{
    accumulate_design_row, add_design_row, centered_gram, ratio_into,
};
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{
    Error,
    patch::{PatchKey, ResultStore},
};

/// the number of bootstrap realizations when nothing else is specified
pub const DEFAULT_NUM_BOOTSTRAP: usize = 500;

/// The available covariance estimators
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarMethod {
    /// shot noise only: a diagonal matrix of `var_num / weight`
    #[default]
    Shot,
    /// leave out one patch at a time
    Jackknife,
    /// treat the pairs starting in each patch as an independent sample
    Sample,
    /// resample the patches with replacement; a realization sums the
    /// per-patch samples of the drawn patches
    Bootstrap,
    /// resample the patches with replacement; a realization includes the
    /// auto pairs of the drawn patches and the cross pairs between them
    Bootstrap2,
}

impl VarMethod {
    const NAMES: &'static [&'static str] =
        &["shot", "jackknife", "sample", "bootstrap", "bootstrap2"];

    pub fn name(&self) -> &'static str {
        match self {
            VarMethod::Shot => "shot",
            VarMethod::Jackknife => "jackknife",
            VarMethod::Sample => "sample",
            VarMethod::Bootstrap => "bootstrap",
            VarMethod::Bootstrap2 => "bootstrap2",
        }
    }
}

impl FromStr for VarMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shot" => Ok(VarMethod::Shot),
            "jackknife" => Ok(VarMethod::Jackknife),
            "sample" => Ok(VarMethod::Sample),
            "bootstrap" => Ok(VarMethod::Bootstrap),
            "bootstrap2" => Ok(VarMethod::Bootstrap2),
            _ => Err(Error::unknown_name("var_method", s, VarMethod::NAMES)),
        }
    }
}

/// Something we can estimate the covariance of.
pub trait CovarianceSource {
    /// the per-patch results
    fn results(&self) -> &ResultStore;

    /// the length of the (flattened) statistic vector
    fn stat_len(&self) -> usize {
        self.results().stat_len()
    }

    /// the weight of the combined result, one entry per statistic entry
    fn combined_weight(&self) -> Vec<f64>;

    /// the numerator of the shot-noise variance
    fn var_num(&self) -> f64;

    fn num_bootstrap(&self) -> usize {
        DEFAULT_NUM_BOOTSTRAP
    }
}

/// A bare store has no shot-noise estimate (its `var_num` is 0).
impl CovarianceSource for ResultStore {
    fn results(&self) -> &ResultStore {
        self
    }

    fn combined_weight(&self) -> Vec<f64> {
        self.combined_total().weight().to_vec()
    }

    fn var_num(&self) -> f64 {
        0.0
    }
}

/// Build the design matrices `(vnum, vdenom)` for a single store.
///
/// Row `r` holds the sums of the stat (weight) of every key listed in
/// `samples[r]`. Keys may repeat, in which case the result is counted once
/// per occurrence. Keys without an entry count as zero.
pub fn make_design_matrix(
    store: &ResultStore,
    samples: &[Vec<PatchKey>],
) -> Result<(Array2<f64>, Array2<f64>), Error> {
    let shape = (samples.len(), store.stat_len());
    let mut vnum = Array2::<f64>::zeros(shape);
    let mut vdenom = Array2::<f64>::zeros(shape);
    fill_design_block(store, samples, &mut vnum, &mut vdenom, 0)?;
    Ok((vnum, vdenom))
}

fn fill_design_block(
    store: &ResultStore,
    samples: &[Vec<PatchKey>],
    vnum: &mut Array2<f64>,
    vdenom: &mut Array2<f64>,
    col_offset: usize,
) -> Result<(), Error> {
    for (row, keys) in samples.iter().enumerate() {
        let mut num_row = vnum.row_mut(row);
        let mut denom_row = vdenom.row_mut(row);
        for key in keys {
            if let Some(result) = store.get(key) {
                accumulate_design_row(
                    &mut num_row,
                    &mut denom_row,
                    col_offset,
                    result.stat(),
                    result.weight(),
                )
                .map_err(Error::internal)?;
            }
        }
    }
    Ok(())
}

/// Estimate the covariance matrix of a single statistic.
pub fn estimate_cov<R: Rng + ?Sized>(
    source: &dyn CovarianceSource,
    method: VarMethod,
    rng: &mut R,
) -> Result<Array2<f64>, Error> {
    estimate_multi_cov(&[source], method, rng)
}

/// Estimate the joint covariance matrix of several statistics.
///
/// The statistics are concatenated in the order of `sources`, so the result
/// has a side length equal to the sum of their stat lengths. The resampling
/// methods require every source to use the same patches (or a single patch
/// along an axis). `rng` is only used by the bootstrap methods; a single set
/// of draws is shared by all of the sources.
pub fn estimate_multi_cov<R: Rng + ?Sized>(
    sources: &[&dyn CovarianceSource],
    method: VarMethod,
    rng: &mut R,
) -> Result<Array2<f64>, Error> {
    if method == VarMethod::Shot {
        return shot_cov(sources);
    }

    let layout = PatchLayout::new(sources, method)?;
    let npatch = layout.npatch;
    match method {
        VarMethod::Jackknife | VarMethod::Sample if npatch < 2 => {
            return Err(Error::too_few_samples(method.name(), "patches", npatch));
        }
        _ => (),
    }

    let (vnum, vdenom, scale, row_weights) = match method {
        VarMethod::Jackknife => {
            let (vnum, vdenom) = layout.design(sources, |i, counts, keys| {
                jackknife_keys(i, npatch, counts, keys)
            })?;
            (vnum, vdenom, 1.0 - 1.0 / npatch as f64, None)
        }
        VarMethod::Sample => {
            let (vnum, vdenom) = layout.design(sources, |i, counts, keys| {
                first_index_keys(i, counts, keys)
            })?;
            let w = sample_weights(&vdenom);
            (vnum, vdenom, 1.0 / (npatch - 1) as f64, Some(w))
        }
        VarMethod::Bootstrap => {
            let nboot = num_bootstrap(sources)?;
            let (pnum, pdenom) = layout.design(sources, |i, counts, keys| {
                first_index_keys(i, counts, keys)
            })?;
            let draws = draw_patches(nboot, npatch, rng);
            let (vnum, vdenom) = combine_rows(&pnum, &pdenom, &draws)?;
            (vnum, vdenom, 1.0 / (nboot - 1) as f64, None)
        }
        VarMethod::Bootstrap2 => {
            let nboot = num_bootstrap(sources)?;
            let draws = draw_patches(nboot, npatch, rng);
            let (vnum, vdenom) = layout.design_rows(sources, nboot, |r, counts, keys| {
                bootstrap2_keys(&draws[r], npatch, counts, keys)
            })?;
            (vnum, vdenom, 1.0 / (nboot - 1) as f64, None)
        }
        VarMethod::Shot => return shot_cov(sources),
    };

    log::debug!(
        "{} covariance from {} samples of {} values",
        method.name(),
        vnum.nrows(),
        vnum.ncols()
    );
    let mut v = Array2::<f64>::zeros(vnum.raw_dim());
    ratio_into(vnum.view(), vdenom.view(), v.view_mut()).map_err(Error::internal)?;

    let n = v.ncols();
    let mut cov = Array2::<f64>::zeros((n, n));
    centered_gram(
        v.view(),
        row_weights.as_ref().map(|w| w.view()),
        scale,
        &mut cov.view_mut(),
    )
    .map_err(Error::internal)?;
    Ok(cov)
}

fn shot_cov(sources: &[&dyn CovarianceSource]) -> Result<Array2<f64>, Error> {
    let n: usize = sources.iter().map(|s| s.stat_len()).sum();
    let mut cov = Array2::<f64>::zeros((n, n));
    let mut k = 0;
    for source in sources {
        let weight = source.combined_weight();
        if weight.len() != source.stat_len() {
            return Err(Error::internal(
                "the combined weight must have an entry for each statistic entry",
            ));
        }
        let var_num = source.var_num();
        for w in weight {
            cov[[k, k]] = if w == 0.0 { 0.0 } else { var_num / w };
            k += 1;
        }
    }
    Ok(cov)
}

/// The patch structure shared by all of the sources.
struct PatchLayout {
    npatch: usize,
    /// `(n1, n2)` of each source
    counts: Vec<(usize, usize)>,
}

impl PatchLayout {
    fn new(sources: &[&dyn CovarianceSource], method: VarMethod) -> Result<Self, Error> {
        let Some(first) = sources.first() else {
            return Err(Error::patches_required(method.name()));
        };
        let (n1, n2) = first.results().patch_counts()?;
        if n1 == 0 {
            return Err(Error::patches_required(method.name()));
        } else if n1 != n2 && n1 != 1 && n2 != 1 {
            return Err(Error::patch_count_mismatch(n1, n2));
        }
        let npatch = n1.max(n2);

        let mut counts = vec![(n1, n2)];
        for (index, source) in sources.iter().enumerate().skip(1) {
            let (m1, m2) = source.results().patch_counts()?;
            // an unpatched source has no per-patch entries to resample
            let fits = |m: usize| m == 1 || m == npatch;
            if !fits(m1) || !fits(m2) || (npatch > 1 && m1 == 1 && m2 == 1) {
                return Err(Error::multi_patch_mismatch(index, npatch, m1, m2));
            }
            counts.push((m1, m2));
        }
        Ok(PatchLayout { npatch, counts })
    }

    /// one design row per patch
    fn design<F>(
        &self,
        sources: &[&dyn CovarianceSource],
        sample_keys: F,
    ) -> Result<(Array2<f64>, Array2<f64>), Error>
    where
        F: Fn(usize, (usize, usize), &[PatchKey]) -> Vec<PatchKey>,
    {
        self.design_rows(sources, self.npatch, sample_keys)
    }

    /// Build the design matrices of the concatenated statistics, with
    /// `nrows` rows.
    ///
    /// `sample_keys(r, counts, keys)` lists the keys of row `r` for a source
    /// with patch counts `counts` and sorted store keys `keys`.
    fn design_rows<F>(
        &self,
        sources: &[&dyn CovarianceSource],
        nrows: usize,
        sample_keys: F,
    ) -> Result<(Array2<f64>, Array2<f64>), Error>
    where
        F: Fn(usize, (usize, usize), &[PatchKey]) -> Vec<PatchKey>,
    {
        let total_len: usize = sources.iter().map(|s| s.stat_len()).sum();
        let mut vnum = Array2::<f64>::zeros((nrows, total_len));
        let mut vdenom = Array2::<f64>::zeros((nrows, total_len));
        let mut col_offset = 0;
        for (source, &counts) in sources.iter().zip(self.counts.iter()) {
            let store = source.results();
            let keys = store.sorted_keys();
            let samples: Vec<Vec<PatchKey>> =
                (0..nrows).map(|r| sample_keys(r, counts, &keys)).collect();
            fill_design_block(store, &samples, &mut vnum, &mut vdenom, col_offset)?;
            col_offset += source.stat_len();
        }
        Ok((vnum, vdenom))
    }
}

/// every key that doesn't involve patch `i`
fn jackknife_keys(
    i: usize,
    npatch: usize,
    (n1, n2): (usize, usize),
    keys: &[PatchKey],
) -> Vec<PatchKey> {
    if n2 == 1 {
        (0..npatch).filter(|&j| j != i).map(|j| PatchKey::new(j, 0)).collect()
    } else if n1 == 1 {
        (0..npatch).filter(|&j| j != i).map(|j| PatchKey::new(0, j)).collect()
    } else {
        keys.iter().filter(|k| k.i != i && k.j != i).copied().collect()
    }
}

/// every key whose first patch is `i`
fn first_index_keys(i: usize, (n1, n2): (usize, usize), keys: &[PatchKey]) -> Vec<PatchKey> {
    if n2 == 1 {
        vec![PatchKey::new(i, 0)]
    } else if n1 == 1 {
        vec![PatchKey::new(0, i)]
    } else {
        keys.iter().filter(|k| k.i == i).copied().collect()
    }
}

/// The auto pairs of every drawn patch (once per draw) plus every stored
/// cross pair between two drawn patches (once, however often its patches
/// were drawn).
fn bootstrap2_keys(
    draw: &[usize],
    npatch: usize,
    (n1, n2): (usize, usize),
    keys: &[PatchKey],
) -> Vec<PatchKey> {
    if n2 == 1 {
        return draw.iter().map(|&i| PatchKey::new(i, 0)).collect();
    } else if n1 == 1 {
        return draw.iter().map(|&i| PatchKey::new(0, i)).collect();
    }

    let mut drawn = vec![false; npatch];
    for &i in draw {
        drawn[i] = true;
    }
    let mut sample: Vec<PatchKey> = draw.iter().map(|&i| PatchKey::new(i, i)).collect();
    sample.extend(
        keys.iter()
            .filter(|k| !k.is_auto() && drawn[k.i] && drawn[k.j])
            .copied(),
    );
    sample
}

/// the fraction of the total weight held by each row
fn sample_weights(vdenom: &Array2<f64>) -> Array1<f64> {
    let mut w = vdenom.sum_axis(Axis(1));
    let total = w.sum();
    w.mapv_inplace(|x| x / total);
    w
}

fn num_bootstrap(sources: &[&dyn CovarianceSource]) -> Result<usize, Error> {
    let nboot = sources
        .iter()
        .map(|s| s.num_bootstrap())
        .max()
        .unwrap_or(DEFAULT_NUM_BOOTSTRAP);
    if nboot < 2 {
        Err(Error::param_value(
            "num_bootstrap",
            nboot as f64,
            "must be at least 2",
        ))
    } else {
        Ok(nboot)
    }
}

/// `nboot` draws of `npatch` patch indices, with replacement
fn draw_patches<R: Rng + ?Sized>(nboot: usize, npatch: usize, rng: &mut R) -> Vec<Vec<usize>> {
    let mut draws = Vec::with_capacity(nboot);
    for _ in 0..nboot {
        let mut draw = Vec::with_capacity(npatch);
        for _ in 0..npatch {
            draw.push(rng.random_range(0..npatch));
        }
        draws.push(draw);
    }
    draws
}

/// each output row is the sum of the per-patch rows listed in a draw
fn combine_rows(
    pnum: &Array2<f64>,
    pdenom: &Array2<f64>,
    draws: &[Vec<usize>],
) -> Result<(Array2<f64>, Array2<f64>), Error> {
    let shape = (draws.len(), pnum.ncols());
    let mut vnum = Array2::<f64>::zeros(shape);
    let mut vdenom = Array2::<f64>::zeros(shape);
    for (row, draw) in draws.iter().enumerate() {
        let mut num_row = vnum.row_mut(row);
        let mut denom_row = vdenom.row_mut(row);
        for &i in draw {
            add_design_row(
                &mut num_row,
                &mut denom_row,
                &pnum.view(),
                &pdenom.view(),
                i,
            )
            .map_err(Error::internal)?;
        }
    }
    Ok((vnum, vdenom))
}
