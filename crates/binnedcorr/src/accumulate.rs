//! Drives the accumulation of per-patch results.
//!
//! We never count pairs ourselves. A [`PairCounter`] (backed by some spatial
//! index) does that for a given patch pair and hands back a [`PatchResult`].
//! The [`Correlation`] object decides which patch pairs to visit and which
//! of the returned results are worth recording.

use crate::{
    Error,
    binning::{BinSpec, BinType},
    covariance::{CovarianceSource, DEFAULT_NUM_BOOTSTRAP, VarMethod, estimate_cov},
    metric::{Metric, MetricOptions},
    patch::{PatchKey, PatchResult, ResultStore},
};
use ndarray::Array2;
use rand::Rng;

/// the most entries a single result may hold
const MAX_STAT_LEN: usize = 1 << 28;

/// Everything the external traversal needs to know to count pairs.
#[derive(Clone, Debug, PartialEq)]
pub struct TraversalParams {
    pub metric: Metric,
    pub bin_type: BinType,
    pub min_sep: f64,
    pub max_sep: f64,
    /// the traversal tolerance
    pub b: f64,
    pub min_cell_size: f64,
    pub max_cell_size: f64,
    pub min_rpar: f64,
    pub max_rpar: f64,
    /// periods along x, y, z (0 means not periodic)
    pub periods: [f64; 3],
}

/// Counts the pairs between patches of the input catalogs.
///
/// Implementors must return results with exactly
/// [`Correlation::stat_len`] entries.
pub trait PairCounter {
    /// count the pairs within a single patch (the whole catalog when there
    /// is only 1 patch)
    fn count_auto(&mut self, patch: usize, params: &TraversalParams) -> PatchResult;

    /// count the pairs between patch `patch1` of the first catalog and
    /// `patch2` of the second catalog
    fn count_cross(&mut self, patch1: usize, patch2: usize, params: &TraversalParams)
    -> PatchResult;

    /// Called with every computed result that isn't recorded in the result
    /// store (because it holds no weight). Does nothing by default.
    fn add_total(&mut self, _skipped: &PatchResult) {}
}

/// The output of [`PairSampler::sample_pairs`] and
/// [`Correlation::sample_pairs`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampledPairs {
    /// index of each pair's point in the first catalog
    pub i1: Vec<usize>,
    /// index of each pair's point in the second catalog
    pub i2: Vec<usize>,
    pub sep: Vec<f64>,
    /// the total number of pairs that fell in the requested range
    pub ntot: usize,
}

impl SampledPairs {
    pub fn len(&self) -> usize {
        self.sep.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sep.is_empty()
    }

    fn truncate(&mut self, n: usize) {
        self.i1.truncate(n);
        self.i2.truncate(n);
        self.sep.truncate(n);
    }
}

/// Samples pairs that fall within a separation range.
pub trait PairSampler {
    /// Draw (at most) `n` pairs with separations in
    /// `params.min_sep..params.max_sep`, and report how many pairs fell in
    /// that range in total.
    fn sample_pairs(&mut self, n: usize, params: &TraversalParams) -> SampledPairs;
}

/// Owns the state of a single two-point correlation calculation: the
/// resolved binning, the per-patch results and the combined result.
#[derive(Clone, Debug)]
pub struct Correlation {
    bin_spec: BinSpec,
    metric_options: MetricOptions,
    results: ResultStore,
    combined: PatchResult,
    var_num: f64,
    num_bootstrap: usize,
    var_method: VarMethod,
}

impl Correlation {
    /// Create a new calculation.
    ///
    /// `n_stats` is the number of statistics held by a result (e.g. 1 for
    /// a count correlation, 2 for xi+ and xi-). Every result holds
    /// `n_stats * bin_spec.n_effective_bins()` entries.
    pub fn new(
        bin_spec: BinSpec,
        metric_options: MetricOptions,
        n_stats: usize,
    ) -> Result<Self, Error> {
        if n_stats == 0 {
            return Err(Error::param_value("n_stats", 0.0, "must be positive"));
        }
        metric_options.validate()?;
        let stat_len = n_stats
            .checked_mul(bin_spec.n_effective_bins())
            .filter(|&len| len <= MAX_STAT_LEN)
            .ok_or_else(|| {
                Error::param_value(
                    "n_stats",
                    n_stats as f64,
                    "implies more entries per result than can be allocated",
                )
            })?;
        Ok(Correlation {
            bin_spec,
            metric_options,
            results: ResultStore::new(stat_len),
            combined: PatchResult::zeros(stat_len),
            var_num: 0.0,
            num_bootstrap: DEFAULT_NUM_BOOTSTRAP,
            var_method: VarMethod::default(),
        })
    }

    pub fn with_num_bootstrap(mut self, num_bootstrap: usize) -> Self {
        self.num_bootstrap = num_bootstrap;
        self
    }

    pub fn with_var_method(mut self, var_method: VarMethod) -> Self {
        self.var_method = var_method;
        self
    }

    pub fn bin_spec(&self) -> &BinSpec {
        &self.bin_spec
    }

    pub fn metric_options(&self) -> &MetricOptions {
        &self.metric_options
    }

    /// the number of entries held by every result
    pub fn stat_len(&self) -> usize {
        self.results.stat_len()
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    /// the merge of every result computed so far
    pub fn combined(&self) -> &PatchResult {
        &self.combined
    }

    pub fn var_method(&self) -> VarMethod {
        self.var_method
    }

    /// The numerator of the shot-noise variance. The owner of the
    /// statistic sets this after accumulation (it depends on the kind of
    /// correlation).
    pub fn set_var_num(&mut self, var_num: f64) {
        self.var_num = var_num;
    }

    /// traversal parameters for the full resolved range
    pub fn traversal_params(&self) -> TraversalParams {
        self.traversal_params_for(
            &self.metric_options,
            self.bin_spec.min_sep(),
            self.bin_spec.max_sep(),
        )
    }

    fn traversal_params_for(
        &self,
        options: &MetricOptions,
        min_sep: f64,
        max_sep: f64,
    ) -> TraversalParams {
        let metric = options.metric;
        let (min_cell_size, max_cell_size) = self.bin_spec.min_max_cell_size(metric);
        TraversalParams {
            metric,
            bin_type: self.bin_spec.bin_type(),
            min_sep,
            max_sep,
            b: self.bin_spec.b(),
            min_cell_size,
            max_cell_size,
            min_rpar: options.min_rpar(),
            max_rpar: options.max_rpar(),
            periods: options.periods(),
        }
    }

    /// Discard everything accumulated so far.
    pub fn clear(&mut self) {
        self.results.reset();
        self.combined.clear();
        self.var_num = 0.0;
    }

    /// Merge `result` into the store entry for `key` and into the combined
    /// result.
    pub fn record(&mut self, key: PatchKey, result: &PatchResult) -> Result<(), Error> {
        self.results.merge(key, result)?;
        self.combined.merge(result)
    }

    fn check_len(&self, key: PatchKey, result: &PatchResult) -> Result<(), Error> {
        if result.len() != self.stat_len() {
            Err(Error::stat_len(key, self.stat_len(), result.len()))
        } else {
            Ok(())
        }
    }

    // merge into the combined result without touching the store
    fn record_unpatched(&mut self, result: &PatchResult) -> Result<(), Error> {
        self.check_len(PatchKey::new(0, 0), result)?;
        self.combined.merge(result)
    }

    fn record_or_skip<C: PairCounter + ?Sized>(
        &mut self,
        key: PatchKey,
        result: PatchResult,
        always: bool,
        counter: &mut C,
    ) -> Result<(), Error> {
        self.check_len(key, &result)?;
        if always || result.has_weight() {
            self.record(key, &result)
        } else {
            counter.add_total(&result);
            Ok(())
        }
    }

    /// Accumulate the auto-correlation of a catalog split into `npatch`
    /// patches.
    ///
    /// Every `(i, i)` result is recorded, even when it is empty. `(i, j)`
    /// with `i < j` is only recorded when it holds some weight. With a
    /// single patch, the result only goes into the combined result.
    pub fn process_auto<C: PairCounter + ?Sized>(
        &mut self,
        npatch: usize,
        counter: &mut C,
    ) -> Result<(), Error> {
        if npatch == 0 {
            return Err(Error::param_value("npatch", 0.0, "must be positive"));
        }
        let params = self.traversal_params();
        if npatch == 1 {
            log::info!("Starting auto-correlation (no patches)");
            let result = counter.count_auto(0, &params);
            return self.record_unpatched(&result);
        }

        log::info!("Starting {npatch} jobs");
        for i in 0..npatch {
            log::info!("Process patch {i}");
            let result = counter.count_auto(i, &params);
            self.record_or_skip(PatchKey::new(i, i), result, true, counter)?;
            for j in (i + 1)..npatch {
                log::info!("Process patches {i},{j} cross");
                let result = counter.count_cross(i, j, &params);
                self.record_or_skip(PatchKey::new(i, j), result, false, counter)?;
            }
        }
        Ok(())
    }

    /// Accumulate the cross-correlation between a catalog split into
    /// `npatch1` patches and another one split into `npatch2` patches.
    ///
    /// `(i, j)` is recorded when `i == j` or when it holds some weight.
    pub fn process_cross<C: PairCounter + ?Sized>(
        &mut self,
        npatch1: usize,
        npatch2: usize,
        counter: &mut C,
    ) -> Result<(), Error> {
        if npatch1 == 0 || npatch2 == 0 {
            return Err(Error::param_value(
                "npatch",
                0.0,
                "must be positive for both catalogs",
            ));
        }
        let params = self.traversal_params();
        if npatch1 == 1 && npatch2 == 1 {
            log::info!("Starting cross-correlation (no patches)");
            let result = counter.count_cross(0, 0, &params);
            return self.record_unpatched(&result);
        }

        log::info!("Starting {} jobs", npatch1 * npatch2);
        for i in 0..npatch1 {
            for j in 0..npatch2 {
                log::info!("Process patches {i},{j} cross");
                let result = counter.count_cross(i, j, &params);
                self.record_or_skip(PatchKey::new(i, j), result, i == j, counter)?;
            }
        }
        Ok(())
    }

    /// Draw a random sample of (at most) `n` pairs whose separations lie in
    /// `min_sep..max_sep`.
    ///
    /// The sampler is queried with the resolved traversal tolerance. When
    /// fewer than `n` pairs exist in the range, all of them are returned.
    ///
    /// `metric` replaces the configured metric for this query only. The
    /// configured rpar and period options must be valid for it.
    pub fn sample_pairs<S: PairSampler + ?Sized>(
        &self,
        n: usize,
        min_sep: f64,
        max_sep: f64,
        metric: Option<Metric>,
        sampler: &mut S,
    ) -> Result<SampledPairs, Error> {
        if !min_sep.is_finite() || min_sep < 0.0 {
            return Err(Error::param_value(
                "min_sep",
                min_sep,
                "must be finite and non-negative",
            ));
        } else if !max_sep.is_finite() {
            return Err(Error::param_value("max_sep", max_sep, "must be finite"));
        } else if min_sep >= max_sep {
            return Err(Error::sep_ordering(min_sep, max_sep));
        }

        let params = match metric {
            Some(metric) => {
                let options = MetricOptions {
                    metric,
                    ..self.metric_options.clone()
                };
                options.validate()?;
                self.traversal_params_for(&options, min_sep, max_sep)
            }
            None => self.traversal_params_for(&self.metric_options, min_sep, max_sep),
        };
        let mut pairs = sampler.sample_pairs(n, &params);
        let n = n.min(pairs.ntot).min(pairs.len());
        pairs.truncate(n);
        log::info!("Sampled {} pairs out of a total of {}", n, pairs.ntot);
        Ok(pairs)
    }

    /// Estimate the covariance of the statistic with the default variance
    /// method (see [`Correlation::with_var_method`]).
    pub fn estimate_cov<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Array2<f64>, Error> {
        estimate_cov(self, self.var_method, rng)
    }
}

impl CovarianceSource for Correlation {
    fn results(&self) -> &ResultStore {
        &self.results
    }

    fn combined_weight(&self) -> Vec<f64> {
        self.combined.weight().to_vec()
    }

    fn var_num(&self) -> f64 {
        self.var_num
    }

    fn num_bootstrap(&self) -> usize {
        self.num_bootstrap
    }
}
