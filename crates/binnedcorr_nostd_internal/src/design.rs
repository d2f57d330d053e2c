//! Helpers for building the "design matrices" that the resampling-based
//! covariance estimators work with.
//!
//! Each row of a design matrix corresponds to a single logical sample (a
//! jackknife realization, a bootstrap draw, ...) and each column to an entry
//! of the (flattened) statistic vector. We track 2 matrices: `vnum`, which
//! holds the summed (unnormalized) statistic, and `vdenom`, which holds the
//! summed weight. The per-sample estimate is their elementwise ratio.

use ndarray::{ArrayView2, ArrayViewMut1, ArrayViewMut2, Zip};

/// fold a single partial result into one row of `vnum` and `vdenom`
///
/// `col_offset` specifies where the partial result starts within a row. This
/// lets the caller lay out several statistic vectors side by side.
pub fn accumulate_design_row(
    vnum_row: &mut ArrayViewMut1<f64>,
    vdenom_row: &mut ArrayViewMut1<f64>,
    col_offset: usize,
    stat: &[f64],
    weight: &[f64],
) -> Result<(), &'static str> {
    if stat.len() != weight.len() {
        return Err("stat and weight must have the same length");
    } else if vnum_row.len() != vdenom_row.len() {
        return Err("vnum_row and vdenom_row must have the same length");
    } else if col_offset + stat.len() > vnum_row.len() {
        return Err("the partial result doesn't fit within the design row");
    }

    for (k, (s, w)) in stat.iter().zip(weight.iter()).enumerate() {
        vnum_row[col_offset + k] += *s;
        vdenom_row[col_offset + k] += *w;
    }
    Ok(())
}

/// add row `src_row` of `vnum`/`vdenom` into `dst_num`/`dst_denom`
///
/// This is used to assemble a bootstrap realization out of per-patch rows.
pub fn add_design_row(
    dst_num: &mut ArrayViewMut1<f64>,
    dst_denom: &mut ArrayViewMut1<f64>,
    vnum: &ArrayView2<f64>,
    vdenom: &ArrayView2<f64>,
    src_row: usize,
) -> Result<(), &'static str> {
    if vnum.shape() != vdenom.shape() {
        return Err("vnum and vdenom must have the same shape");
    } else if src_row >= vnum.nrows() {
        return Err("src_row is out of bounds");
    } else if dst_num.len() != vnum.ncols() || dst_denom.len() != vnum.ncols() {
        return Err("destination rows have the wrong length");
    }
    for k in 0..vnum.ncols() {
        dst_num[k] += vnum[[src_row, k]];
        dst_denom[k] += vdenom[[src_row, k]];
    }
    Ok(())
}

/// Compute `out = vnum / vdenom` elementwise.
///
/// We intentionally don't special-case zero denominators: an empty sample
/// yields NaN (or an infinity), exactly as the plain division would.
pub fn ratio_into(
    vnum: ArrayView2<f64>,
    vdenom: ArrayView2<f64>,
    mut out: ArrayViewMut2<f64>,
) -> Result<(), &'static str> {
    if vnum.shape() != vdenom.shape() || vnum.shape() != out.shape() {
        return Err("vnum, vdenom, and out must all have the same shape");
    }
    Zip::from(&mut out)
        .and(&vnum)
        .and(&vdenom)
        .for_each(|o, &n, &d| *o = n / d);
    Ok(())
}
