// ========================================================================================
//
//                      SINGLE-PASS WEIGHTED COVARIANCE ESTIMATORS
//
// ========================================================================================
//
// ### Purpose ###
//
// Estimates the covariance of a weighted sample in one pass using the weighted form
// of Welford's update. Samples are the rows of an `N x D` matrix. The kernel
// estimators weight each sample by a Gaussian of its distance from a reference point,
// which is how a cluster's covariance is seeded around its centre.
//
// The periodic estimator measures displacements with the minimum-image convention
// and only fills the diagonal; off-diagonal periodic covariances are defined as zero.
// On a periodic axis the running centre after each sample is the weighted circular
// mean of the samples seen so far plus that sample's Welford step, and the next
// displacement is measured from it.

use crate::periodic::{wrapped_delta, wrapped_squared_distance};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};
use std::f64::consts::TAU;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovarianceError {
    #[error("Covariance estimation needs at least 2 samples, but got {0}.")]
    InsufficientSamples(usize),

    #[error("Kernel bandwidth must be positive and finite, but was {0}.")]
    InvalidBandwidth(f64),

    #[error("Dimension mismatch in {what}: expected {expected}, found {found}.")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Sample {index} has invalid weight {weight}; weights must be finite and non-negative.")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("All sample weights are zero; the covariance is undefined.")]
    ZeroTotalWeight,
}

/// Output of the estimators.
#[derive(Debug, Clone)]
pub struct CovarianceEstimate {
    /// Bessel-corrected weighted covariance, `D x D`.
    pub covariance: Array2<f64>,
    pub total_weight: f64,
    /// Weighted mean; the circular mean on periodic axes.
    pub mean: Array1<f64>,
}

fn validate_samples(
    x: &ArrayView2<f64>,
    weights: &ArrayView1<f64>,
) -> Result<(usize, usize), CovarianceError> {
    let (n, d) = x.dim();
    if n <= 1 {
        return Err(CovarianceError::InsufficientSamples(n));
    }
    if weights.len() != n {
        return Err(CovarianceError::DimensionMismatch {
            what: "weights",
            expected: n,
            found: weights.len(),
        });
    }
    if let Some((index, &weight)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !(w.is_finite() && **w >= 0.0))
    {
        return Err(CovarianceError::InvalidWeight { index, weight });
    }
    Ok((n, d))
}

fn check_vector_length(
    what: &'static str,
    expected: usize,
    v: &ArrayView1<f64>,
) -> Result<(), CovarianceError> {
    if v.len() != expected {
        return Err(CovarianceError::DimensionMismatch {
            what,
            expected,
            found: v.len(),
        });
    }
    Ok(())
}

fn kernel_weights<F>(
    x: &ArrayView2<f64>,
    bandwidth: f64,
    squared_distance: F,
) -> Result<Array1<f64>, CovarianceError>
where
    F: Fn(ArrayView1<f64>) -> f64,
{
    if !(bandwidth.is_finite() && bandwidth > 0.0) {
        return Err(CovarianceError::InvalidBandwidth(bandwidth));
    }
    let denom = 2.0 * bandwidth * bandwidth;
    Ok(x
        .outer_iter()
        .map(|row| (-squared_distance(row) / denom).exp())
        .collect())
}

/// Scales the accumulated scatter into a Bessel-corrected covariance.
fn finish_covariance(mut scatter: Array2<f64>, total_weight: f64, n: usize) -> Array2<f64> {
    let d = scatter.nrows();
    for a in 0..d {
        for b in 0..a {
            scatter[[b, a]] = scatter[[a, b]];
        }
    }
    let correction = n as f64 / (n as f64 - 1.0);
    scatter.mapv_inplace(|v| v / total_weight * correction);
    scatter
}

/// Welford estimate of the covariance of the rows of `x` with explicit `weights`.
///
/// Zero-weight samples are skipped but still count towards the `N / (N - 1)` correction.
pub fn weighted_covariance_with_weights(
    x: ArrayView2<f64>,
    weights: ArrayView1<f64>,
) -> Result<CovarianceEstimate, CovarianceError> {
    let (n, d) = validate_samples(&x, &weights)?;

    let mut mean = Array1::<f64>::zeros(d);
    let mut scatter = Array2::<f64>::zeros((d, d));
    let mut total_weight = 0.0;

    for (row, &w) in x.outer_iter().zip(weights.iter()) {
        if w == 0.0 {
            continue;
        }
        let next_weight = total_weight + w;
        let delta = &row - &mean;
        let step = &delta * (w / next_weight);
        mean += &step;
        for a in 0..d {
            for b in 0..=a {
                scatter[[a, b]] += total_weight * delta[a] * step[b];
            }
        }
        total_weight = next_weight;
    }

    if total_weight == 0.0 {
        return Err(CovarianceError::ZeroTotalWeight);
    }
    Ok(CovarianceEstimate {
        covariance: finish_covariance(scatter, total_weight, n),
        total_weight,
        mean,
    })
}

/// Kernel-weighted covariance: sample `i` gets weight
/// `exp(-|x_i - reference|^2 / (2 bandwidth^2))`.
pub fn weighted_covariance(
    x: ArrayView2<f64>,
    reference: ArrayView1<f64>,
    bandwidth: f64,
) -> Result<CovarianceEstimate, CovarianceError> {
    check_vector_length("reference point", x.ncols(), &reference)?;
    let weights = kernel_weights(&x, bandwidth, |row| {
        Zip::from(&row)
            .and(&reference)
            .fold(0.0, |acc, &a, &b| acc + (a - b) * (a - b))
    })?;
    weighted_covariance_with_weights(x, weights.view())
}

/// Periodic twin of [`weighted_covariance_with_weights`].
///
/// Axes with `period <= 0` are treated as Euclidean. Only the diagonal of the
/// covariance is populated. With `S_k`, `C_k` the weighted sine and cosine sums of
/// the samples seen so far, the running centre on a periodic axis becomes
/// `atan2(S_k, C_k) * L_k / (2 pi) + R_k` after each step. The returned `mean` is
/// the circular mean of all samples.
pub fn wrapped_weighted_covariance_with_weights(
    x: ArrayView2<f64>,
    weights: ArrayView1<f64>,
    period: ArrayView1<f64>,
) -> Result<CovarianceEstimate, CovarianceError> {
    let (n, d) = validate_samples(&x, &weights)?;
    check_vector_length("period", d, &period)?;

    let mut mean = Array1::<f64>::zeros(d);
    let mut variance = Array1::<f64>::zeros(d);
    let mut sin_sum = Array1::<f64>::zeros(d);
    let mut cos_sum = Array1::<f64>::zeros(d);
    let mut total_weight = 0.0;

    for (row, &w) in x.outer_iter().zip(weights.iter()) {
        if w == 0.0 {
            continue;
        }
        let next_weight = total_weight + w;
        let delta = wrapped_delta(period, row, mean.view());
        let step = &delta * (w / next_weight);
        for k in 0..d {
            variance[k] += total_weight * delta[k] * step[k];
            if period[k] > 0.0 {
                let angle = TAU * row[k] / period[k];
                sin_sum[k] += w * angle.sin();
                cos_sum[k] += w * angle.cos();
                mean[k] = sin_sum[k].atan2(cos_sum[k]) * period[k] / TAU + step[k];
            } else {
                mean[k] += step[k];
            }
        }
        total_weight = next_weight;
    }

    if total_weight == 0.0 {
        return Err(CovarianceError::ZeroTotalWeight);
    }

    for k in 0..d {
        if period[k] > 0.0 {
            mean[k] = sin_sum[k].atan2(cos_sum[k]) * period[k] / TAU;
        }
    }

    let scatter = Array2::from_diag(&variance);
    Ok(CovarianceEstimate {
        covariance: finish_covariance(scatter, total_weight, n),
        total_weight,
        mean,
    })
}

/// Periodic kernel-weighted covariance; kernel distances use the minimum image.
pub fn wrapped_weighted_covariance(
    x: ArrayView2<f64>,
    reference: ArrayView1<f64>,
    bandwidth: f64,
    period: ArrayView1<f64>,
) -> Result<CovarianceEstimate, CovarianceError> {
    check_vector_length("reference point", x.ncols(), &reference)?;
    check_vector_length("period", x.ncols(), &period)?;
    let weights = kernel_weights(&x, bandwidth, |row| {
        wrapped_squared_distance(period, row, reference)
    })?;
    wrapped_weighted_covariance_with_weights(x, weights.view(), period)
}
