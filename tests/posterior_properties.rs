use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2, array};
use pamm::linalg::inverse;
use pamm::posterior::{PosteriorParams, mixture_density, most_probable_cluster, posterior};
use pamm::{GaussianCluster, VonMisesCluster};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::f64::consts::TAU;

fn prepared_gaussian(weight: f64, mean: Array1<f64>, covariance: Array2<f64>) -> GaussianCluster {
    let mut cluster = GaussianCluster::new(weight, mean, covariance).unwrap();
    cluster.prepare().unwrap();
    cluster
}

fn random_spd(rng: &mut StdRng, d: usize) -> Array2<f64> {
    let normal = Normal::new(0.0, 1.0).unwrap();
    let a = Array2::from_shape_fn((d, d), |_| normal.sample(rng));
    a.dot(&a.t()) + Array2::<f64>::eye(d) * d as f64
}

#[test]
fn single_cluster_claims_every_point() {
    let mut rng = StdRng::seed_from_u64(7);
    let normal = Normal::new(0.0, 1.5).unwrap();
    let cluster = prepared_gaussian(0.3, array![1.0, -2.0, 0.5], random_spd(&mut rng, 3));
    let clusters = [cluster];
    let params = PosteriorParams::default();

    for _ in 0..50 {
        let x = Array1::from_shape_fn(3, |_| normal.sample(&mut rng));
        let p = posterior(x.view(), &clusters, &params).unwrap();
        assert_abs_diff_eq!(p[0], 1.0, epsilon = 1e-12);
    }
}

#[test]
fn posteriors_sum_to_one_without_null_weight() {
    let mut rng = StdRng::seed_from_u64(11);
    let clusters: Vec<GaussianCluster> = (0..4)
        .map(|k| {
            let mean = array![k as f64 * 2.0, (k as f64).sin()];
            prepared_gaussian(rng.gen_range(0.1..2.0), mean, random_spd(&mut rng, 2))
        })
        .collect();
    let params = PosteriorParams::new(0.7, 0.0).unwrap();
    let normal = Normal::new(3.0, 4.0).unwrap();

    for _ in 0..100 {
        let x = Array1::from_shape_fn(2, |_| normal.sample(&mut rng));
        let p = posterior(x.view(), &clusters, &params).unwrap();
        assert!(p.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_abs_diff_eq!(p.sum(), 1.0, epsilon = 1e-12);
    }
}

#[test]
fn large_null_weight_suppresses_all_clusters() {
    let clusters = [
        prepared_gaussian(1.0, array![0.0], array![[1.0]]),
        prepared_gaussian(1.0, array![3.0], array![[1.0]]),
    ];
    let params = PosteriorParams::new(1.0, 1e12).unwrap();
    let p = posterior(array![0.5].view(), &clusters, &params).unwrap();
    assert!(p.iter().all(|&v| v >= 0.0 && v < 1e-10));
}

#[test]
fn one_dimensional_pair_of_clusters() {
    let clusters = [
        prepared_gaussian(1.0, array![-2.0], array![[1.0]]),
        prepared_gaussian(1.0, array![2.0], array![[1.0]]),
    ];
    let params = PosteriorParams::default();

    let p = posterior(array![0.0].view(), &clusters, &params).unwrap();
    assert_abs_diff_eq!(p[0], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(p[1], 0.5, epsilon = 1e-12);

    // Log-densities at x = 2 differ by 8.
    let p = posterior(array![2.0].view(), &clusters, &params).unwrap();
    let expected = (-8.0_f64).exp() / (1.0 + (-8.0_f64).exp());
    assert_abs_diff_eq!(p[0], expected, epsilon = 1e-12);
    assert_abs_diff_eq!(p[1], 1.0 - expected, epsilon = 1e-12);
}

#[test]
fn two_dimensional_pair_of_clusters() {
    let clusters = [
        prepared_gaussian(1.0, array![0.0, 0.0], Array2::eye(2)),
        prepared_gaussian(1.0, array![3.0, 0.0], Array2::eye(2)),
    ];
    let params = PosteriorParams::default();
    let x = array![1.0, 0.0];

    let p = posterior(x.view(), &clusters, &params).unwrap();
    let expected = 1.0 / (1.0 + (-1.5_f64).exp());
    assert_abs_diff_eq!(p[0], expected, epsilon = 1e-12);
    assert_eq!(
        most_probable_cluster(x.view(), &clusters, &params).unwrap().map(|(k, _)| k),
        Some(0)
    );

    let density = mixture_density(x.view(), &clusters).unwrap();
    let by_hand = ((-0.5_f64).exp() + (-2.0_f64).exp()) / TAU;
    assert_abs_diff_eq!(density, by_hand, epsilon = 1e-12);
}

#[test]
fn von_mises_pair_on_the_circle() {
    let period = array![TAU];
    let near =
        VonMisesCluster::new_prepared(1.0, array![0.1], array![[0.2]], period.clone()).unwrap();
    let far = VonMisesCluster::new_prepared(1.0, array![3.0], array![[0.2]], period).unwrap();
    let clusters = [near, far];
    let params = PosteriorParams::default();

    // Just below the wrap point the nearest mean is across the boundary at 0.1.
    let p = posterior(array![TAU - 0.05].view(), &clusters, &params).unwrap();
    assert!(p[0] > 0.99);
    assert_abs_diff_eq!(p.sum(), 1.0, epsilon = 1e-12);
}

#[test]
fn inverting_twice_recovers_the_matrix() {
    let mut rng = StdRng::seed_from_u64(3);
    for d in 1..=5 {
        let m = random_spd(&mut rng, d);
        let back = inverse(&inverse(&m).unwrap()).unwrap();
        assert_abs_diff_eq!(back, m, epsilon = 1e-8);
    }
}
