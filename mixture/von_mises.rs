use crate::bessel::bessel_i0_scaled;
use crate::component::{
    ClusterError, MixtureComponent, check_parameter_shapes, check_point_dimension,
};
use crate::linalg::{eigenvalues, inverse};
use crate::periodic::wrapped_delta;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::f64::consts::TAU;

#[derive(Debug, Clone)]
struct VonMisesCache {
    log_norm: f64,
    inverse_covariance: Array2<f64>,
    concentrations: Array1<f64>,
}

/// A multivariate von Mises mixture component for periodic coordinates.
///
/// Every axis must be periodic: the normalization and the distance both divide by
/// the period.
#[derive(Debug, Clone)]
pub struct VonMisesCluster {
    weight: f64,
    mean: Array1<f64>,
    covariance: Array2<f64>,
    period: Array1<f64>,
    cache: Option<VonMisesCache>,
}

impl VonMisesCluster {
    pub fn new(
        weight: f64,
        mean: Array1<f64>,
        covariance: Array2<f64>,
        period: Array1<f64>,
    ) -> Result<Self, ClusterError> {
        let dimension = check_parameter_shapes(&mean, &covariance)?;
        if period.len() != dimension {
            return Err(ClusterError::InvalidShape(format!(
                "mean has length {dimension} but period has length {}",
                period.len()
            )));
        }
        if let Some((axis, &p)) = period.iter().enumerate().find(|(_, p)| !(**p > 0.0)) {
            return Err(ClusterError::InvalidPeriod { axis, period: p });
        }
        Ok(Self {
            weight,
            mean,
            covariance,
            period,
            cache: None,
        })
    }

    pub fn new_prepared(
        weight: f64,
        mean: Array1<f64>,
        covariance: Array2<f64>,
        period: Array1<f64>,
    ) -> Result<Self, ClusterError> {
        let mut cluster = Self::new(weight, mean, covariance, period)?;
        cluster.prepare()?;
        Ok(cluster)
    }

    /// Inverts the covariance and sets `log_norm = -log Z` with
    /// `Z = prod_k period_k * I0(e_k) * exp(-e_k)`, `e_k` the real eigenvalues of the
    /// inverse covariance. Evaluated in log space so large concentrations stay finite.
    pub fn prepare(&mut self) -> Result<(), ClusterError> {
        self.cache = None;
        let inverse_covariance = inverse(&self.covariance)?;
        let concentrations = eigenvalues(&inverse_covariance)?;

        let log_z: f64 = self
            .period
            .iter()
            .zip(concentrations.iter())
            .map(|(&p, &e)| p.ln() + bessel_i0_scaled(e).ln() + e.abs() - e)
            .sum();
        let log_norm = -log_z;
        if !log_norm.is_finite() {
            return Err(ClusterError::NonFiniteNormalization(log_norm));
        }
        log::debug!(
            "Prepared {}-D von Mises cluster: log_norm={log_norm:.6}",
            self.dimension()
        );

        self.cache = Some(VonMisesCache {
            log_norm,
            inverse_covariance,
            concentrations,
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

    pub fn period(&self) -> ArrayView1<'_, f64> {
        self.period.view()
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

    pub fn log_norm(&self) -> Option<f64> {
        self.cache.as_ref().map(|c| c.log_norm)
    }

    pub fn inverse_covariance(&self) -> Option<ArrayView2<'_, f64>> {
        self.cache.as_ref().map(|c| c.inverse_covariance.view())
    }

    /// Real eigenvalues of the inverse covariance used by the normalization.
    pub fn concentrations(&self) -> Option<ArrayView1<'_, f64>> {
        self.cache.as_ref().map(|c| c.concentrations.view())
    }

    /// Periodic analogue of the squared Mahalanobis distance.
    ///
    /// With `t_k = 2 pi * delta_k` (minimum-image `delta = x - mean`) this is
    /// `2 * (sum_k icov[k,k] (1 - cos(t_k / L_k))
    ///     + sum_{i<j} icov[i,j] sin(t_i / L_i) sin(t_j / L_i))`.
    /// The second sine of the cross term is scaled by `L_i`, not `L_j`, which makes
    /// the form asymmetric when the periods differ. Kept as is for compatibility
    /// with existing cluster files.
    pub fn squared_periodic_mahalanobis(&self, x: ArrayView1<f64>) -> Result<f64, ClusterError> {
        check_point_dimension(self.dimension(), &x)?;
        let cache = self.cache.as_ref().ok_or(ClusterError::NotPrepared)?;
        let icov = &cache.inverse_covariance;
        let angle = wrapped_delta(self.period.view(), x, self.mean.view()) * TAU;

        let d = self.dimension();
        let mut diagonal = 0.0;
        let mut cross = 0.0;
        for i in 0..d {
            let li = self.period[i];
            diagonal += icov[[i, i]] * (1.0 - (angle[i] / li).cos());
            let sin_i = (angle[i] / li).sin();
            for j in (i + 1)..d {
                cross += icov[[i, j]] * sin_i * (angle[j] / li).sin();
            }
        }
        Ok(2.0 * (diagonal + cross))
    }
}

impl MixtureComponent for VonMisesCluster {
    fn dimension(&self) -> usize {
        self.mean.len()
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn log_density(&self, x: ArrayView1<f64>) -> Result<f64, ClusterError> {
        let distance = self.squared_periodic_mahalanobis(x)?;
        let log_norm = self.log_norm().ok_or(ClusterError::NotPrepared)?;
        Ok(log_norm - 0.5 * distance)
    }
}
