#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! Mixture-model engine for Probabilistic Analysis of Molecular Motifs (PAMM).
//!
//! Gaussian and von Mises cluster models, their normalization and density
//! evaluation, posterior soft assignment with smoothing and a null hypothesis,
//! and the numerical primitives they are built on.

pub mod bessel;
pub mod component;
pub mod config;
pub mod covariance;
pub mod gaussian;
pub mod io;
pub mod linalg;
pub mod periodic;
pub mod posterior;
pub mod von_mises;

pub use component::{ClusterError, MixtureComponent};
pub use gaussian::GaussianCluster;
pub use posterior::{PosteriorParams, posterior};
pub use von_mises::VonMisesCluster;
