use crate::component::{
    ClusterError, MixtureComponent, check_parameter_shapes, check_point_dimension,
};
use crate::linalg::{determinant, inverse};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::f64::consts::TAU;

/// Quantities derived from the covariance by [`GaussianCluster::prepare`].
#[derive(Debug, Clone)]
struct GaussianCache {
    determinant: f64,
    log_norm: f64,
    inverse_covariance: Array2<f64>,
}

/// A multivariate normal mixture component.
///
/// The dimension is fixed at construction. Editing the covariance through
/// [`GaussianCluster::set_covariance`] drops the cached normalization and inverse,
/// so the cluster has to be prepared again before evaluation.
#[derive(Debug, Clone)]
pub struct GaussianCluster {
    weight: f64,
    mean: Array1<f64>,
    covariance: Array2<f64>,
    cache: Option<GaussianCache>,
}

impl GaussianCluster {
    pub fn new(
        weight: f64,
        mean: Array1<f64>,
        covariance: Array2<f64>,
    ) -> Result<Self, ClusterError> {
        check_parameter_shapes(&mean, &covariance)?;
        Ok(Self {
            weight,
            mean,
            covariance,
            cache: None,
        })
    }

    /// Builds and prepares in one step.
    pub fn new_prepared(
        weight: f64,
        mean: Array1<f64>,
        covariance: Array2<f64>,
    ) -> Result<Self, ClusterError> {
        let mut cluster = Self::new(weight, mean, covariance)?;
        cluster.prepare()?;
        Ok(cluster)
    }

    /// Caches the determinant, the inverse covariance and the log normalization
    /// `-0.5 * (D log(2 pi) + log det)`.
    ///
    /// A covariance that is singular or not positive definite is an error, and on
    /// failure the cluster stays unprepared.
    pub fn prepare(&mut self) -> Result<(), ClusterError> {
        self.cache = None;
        let inverse_covariance = inverse(&self.covariance)?;
        let det = determinant(&self.covariance);
        if !(det > 0.0) {
            return Err(ClusterError::NotPositiveDefinite(det));
        }
        let log_norm = -0.5 * (self.dimension() as f64 * TAU.ln() + det.ln());
        if !log_norm.is_finite() {
            return Err(ClusterError::NonFiniteNormalization(log_norm));
        }
        log::debug!(
            "Prepared {}-D Gaussian cluster: det={det:.6e}, log_norm={log_norm:.6}",
            self.dimension()
        );
        self.cache = Some(GaussianCache {
            determinant: det,
            log_norm,
            inverse_covariance,
        });
        Ok(())
    }

    pub fn is_prepared(&self) -> bool {
        self.cache.is_some()
    }

    pub fn mean(&self) -> ArrayView1<'_, f64> {
        self.mean.view()
    }

    pub fn covariance(&self) -> ArrayView2<'_, f64> {
        self.covariance.view()
    }

    /// Replaces the covariance and invalidates the prepared state.
    pub fn set_covariance(&mut self, covariance: Array2<f64>) -> Result<(), ClusterError> {
        check_parameter_shapes(&self.mean, &covariance)?;
        self.covariance = covariance;
        self.cache = None;
        Ok(())
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn determinant(&self) -> Option<f64> {
        self.cache.as_ref().map(|c| c.determinant)
    }

    pub fn log_norm(&self) -> Option<f64> {
        self.cache.as_ref().map(|c| c.log_norm)
    }

    pub fn inverse_covariance(&self) -> Option<ArrayView2<'_, f64>> {
        self.cache.as_ref().map(|c| c.inverse_covariance.view())
    }
}

impl MixtureComponent for GaussianCluster {
    fn dimension(&self) -> usize {
        self.mean.len()
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    /// `log_norm - 0.5 * (x - mean)' S^-1 (x - mean)`.
    fn log_density(&self, x: ArrayView1<f64>) -> Result<f64, ClusterError> {
        check_point_dimension(self.dimension(), &x)?;
        let cache = self.cache.as_ref().ok_or(ClusterError::NotPrepared)?;
        let diff = &x - &self.mean;
        let mahalanobis = diff.dot(&cache.inverse_covariance.dot(&diff));
        Ok(cache.log_norm - 0.5 * mahalanobis)
    }
}
