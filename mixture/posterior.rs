//! Soft cluster assignment for a mixture of prepared components.
//!
//! The engine is written once against [`MixtureComponent`] and serves both the
//! Gaussian and the von Mises models.

use crate::component::{ClusterError, MixtureComponent};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PosteriorError {
    #[error("Smoothing exponent alpha must be finite and positive, but was {0}.")]
    InvalidAlpha(f64),

    #[error("Null-hypothesis weight zeta must be finite and non-negative, but was {0}.")]
    InvalidZeta(f64),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Smoothing and null-hypothesis settings for [`posterior`].
///
/// `alpha > 1` sharpens the assignment and `alpha < 1` flattens it; `zeta`
/// reserves probability mass for "no cluster".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PosteriorParams {
    pub alpha: f64,
    pub zeta: f64,
}

impl Default for PosteriorParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            zeta: 0.0,
        }
    }
}

impl PosteriorParams {
    pub fn new(alpha: f64, zeta: f64) -> Result<Self, PosteriorError> {
        let params = Self { alpha, zeta };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), PosteriorError> {
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(PosteriorError::InvalidAlpha(self.alpha));
        }
        if !(self.zeta.is_finite() && self.zeta >= 0.0) {
            return Err(PosteriorError::InvalidZeta(self.zeta));
        }
        Ok(())
    }
}

/// Log-densities of every component at `x` and their maximum.
fn component_log_densities<C: MixtureComponent>(
    x: ArrayView1<f64>,
    clusters: &[C],
) -> Result<(Array1<f64>, f64), ClusterError> {
    let mut log_densities = Array1::zeros(clusters.len());
    let mut max_log = f64::NEG_INFINITY;
    for (slot, cluster) in log_densities.iter_mut().zip(clusters) {
        let value = cluster.log_density(x)?;
        if value > max_log {
            max_log = value;
        }
        *slot = value;
    }
    Ok((log_densities, max_log))
}

/// Posterior membership probabilities of `x` for every cluster.
///
/// With `l_k` the component log-densities and `m = max_k l_k`,
/// `u_k = (exp(l_k - m) * weight_k)^alpha` and `p_k = u_k / (zeta + sum_k u_k)`.
/// A zero normalizer yields an all-zero vector instead of an error.
pub fn posterior<C: MixtureComponent>(
    x: ArrayView1<f64>,
    clusters: &[C],
    params: &PosteriorParams,
) -> Result<Array1<f64>, PosteriorError> {
    params.validate()?;
    let (log_densities, max_log) = component_log_densities(x, clusters)?;

    if !max_log.is_finite() {
        if !clusters.is_empty() {
            log::warn!(
                "All cluster log-densities are non-finite ({max_log}); returning a zero posterior."
            );
        }
        return Ok(Array1::zeros(clusters.len()));
    }

    let mut unnormalized = Array1::<f64>::zeros(clusters.len());
    for ((u, &l), cluster) in unnormalized.iter_mut().zip(log_densities.iter()).zip(clusters) {
        *u = ((l - max_log).exp() * cluster.weight()).powf(params.alpha);
    }

    let normalizer = params.zeta + unnormalized.sum();
    if normalizer == 0.0 {
        log::warn!("Posterior normalizer vanished; returning a zero posterior.");
        return Ok(Array1::zeros(clusters.len()));
    }
    unnormalized.mapv_inplace(|u| u / normalizer);
    Ok(unnormalized)
}

/// Index and value of the largest positive entry of a posterior vector.
pub fn strongest_assignment(p: ArrayView1<f64>) -> Option<(usize, f64)> {
    p.iter()
        .copied()
        .enumerate()
        .filter(|&(_, value)| value > 0.0)
        .fold(None, |best: Option<(usize, f64)>, (k, value)| match best {
            Some((_, current)) if current >= value => best,
            _ => Some((k, value)),
        })
}

/// Index and probability of the most probable cluster, or `None` if the set is
/// empty or the posterior is degenerate.
pub fn most_probable_cluster<C: MixtureComponent>(
    x: ArrayView1<f64>,
    clusters: &[C],
    params: &PosteriorParams,
) -> Result<Option<(usize, f64)>, PosteriorError> {
    let p = posterior(x, clusters, params)?;
    Ok(strongest_assignment(p.view()))
}

/// `log(sum_k weight_k * density_k(x))`, evaluated with a max shift.
///
/// An empty cluster set gives `-inf`.
pub fn mixture_log_density<C: MixtureComponent>(
    x: ArrayView1<f64>,
    clusters: &[C],
) -> Result<f64, ClusterError> {
    let (log_densities, max_log) = component_log_densities(x, clusters)?;
    if !max_log.is_finite() {
        return Ok(max_log);
    }
    let total: f64 = log_densities
        .iter()
        .zip(clusters)
        .map(|(&l, cluster)| cluster.weight() * (l - max_log).exp())
        .sum();
    Ok(max_log + total.ln())
}

/// `sum_k weight_k * density_k(x)`.
pub fn mixture_density<C: MixtureComponent>(
    x: ArrayView1<f64>,
    clusters: &[C],
) -> Result<f64, ClusterError> {
    Ok(mixture_log_density(x, clusters)?.exp())
}
