use crate::linalg::LinalgError;
use ndarray::{Array1, Array2, ArrayView1};
use thiserror::Error;

/// Errors raised while building, preparing, or evaluating a cluster.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Point has dimension {found}, but the cluster has dimension {expected}.")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Invalid cluster shape: {0}")]
    InvalidShape(String),

    #[error("Von Mises clusters need positive periods, but axis {axis} has period {period}.")]
    InvalidPeriod { axis: usize, period: f64 },

    #[error("Cluster must be prepared before it can be evaluated.")]
    NotPrepared,

    #[error("Covariance is not positive definite (determinant {0:.6e}).")]
    NotPositiveDefinite(f64),

    #[error("Cluster normalization is not finite (log_norm={0}).")]
    NonFiniteNormalization(f64),

    #[error("Numerical failure while preparing cluster: {0}")]
    Numerical(#[from] LinalgError),
}

/// The capability the posterior engine needs from a mixture component.
pub trait MixtureComponent {
    fn dimension(&self) -> usize;

    /// Unnormalized mixture weight.
    fn weight(&self) -> f64;

    /// Log of the normalized component density at `x`.
    fn log_density(&self, x: ArrayView1<f64>) -> Result<f64, ClusterError>;

    fn density(&self, x: ArrayView1<f64>) -> Result<f64, ClusterError> {
        Ok(self.log_density(x)?.exp())
    }
}

pub(crate) fn check_point_dimension(
    expected: usize,
    x: &ArrayView1<f64>,
) -> Result<(), ClusterError> {
    if x.len() != expected {
        return Err(ClusterError::DimensionMismatch {
            expected,
            found: x.len(),
        });
    }
    Ok(())
}

/// Validates `mean` and `covariance` against each other and returns the dimension.
pub(crate) fn check_parameter_shapes(
    mean: &Array1<f64>,
    covariance: &Array2<f64>,
) -> Result<usize, ClusterError> {
    let dimension = mean.len();
    if dimension == 0 {
        return Err(ClusterError::InvalidShape(
            "cluster dimension must be at least 1".to_string(),
        ));
    }
    if covariance.dim() != (dimension, dimension) {
        return Err(ClusterError::InvalidShape(format!(
            "mean has length {dimension} but covariance has shape {:?}",
            covariance.dim()
        )));
    }
    Ok(dimension)
}
