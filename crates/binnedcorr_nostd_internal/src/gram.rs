//! Implements the final contraction shared by every resampling-based
//! covariance estimator:
//!
//! ```text
//! C = scale * Σᵢ wᵢ (vᵢ - v̄) (vᵢ - v̄)ᵀ
//! ```
//!
//! where `vᵢ` is row `i` of the sample matrix, `v̄` is the (unweighted) mean
//! of the rows and `wᵢ` is an optional per-row weight (1 when omitted).

use ndarray::{Array1, ArrayView1, ArrayView2, ArrayViewMut2, Axis};

/// compute the unweighted mean of every column of `samples`
fn column_means(samples: &ArrayView2<f64>) -> Array1<f64> {
    let n_rows = samples.nrows() as f64;
    let mut means = Array1::<f64>::zeros(samples.ncols());
    for row in samples.axis_iter(Axis(0)) {
        for (m, &x) in means.iter_mut().zip(row.iter()) {
            *m += x;
        }
    }
    means.mapv_inplace(|m| m / n_rows);
    means
}

/// Overwrites `out` with the scaled, centered Gram matrix of `samples`.
///
/// `samples` has shape `[n_samples, n]`, `out` has shape `[n, n]`. The
/// result is exactly symmetric: we only evaluate the upper triangle and
/// mirror it.
pub fn centered_gram(
    samples: ArrayView2<f64>,
    row_weights: Option<ArrayView1<f64>>,
    scale: f64,
    out: &mut ArrayViewMut2<f64>,
) -> Result<(), &'static str> {
    let n = samples.ncols();
    if samples.nrows() == 0 {
        return Err("at least one sample is required");
    } else if out.shape() != [n, n] {
        return Err("out must have shape [n, n], where n is the number of columns in samples");
    } else if let Some(w) = &row_weights {
        if w.len() != samples.nrows() {
            return Err("row_weights must have an entry for each sample");
        }
    }

    let means = column_means(&samples);
    out.fill(0.0);
    for (i, row) in samples.axis_iter(Axis(0)).enumerate() {
        let w_i = match &row_weights {
            Some(w) => w[i],
            None => 1.0,
        };
        for a in 0..n {
            let da = w_i * (row[a] - means[a]);
            for b in a..n {
                out[[a, b]] += da * (row[b] - means[b]);
            }
        }
    }

    for a in 0..n {
        for b in a..n {
            let val = scale * out[[a, b]];
            out[[a, b]] = val;
            out[[b, a]] = val;
        }
    }
    Ok(())
}
