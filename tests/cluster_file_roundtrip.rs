use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::{Array1, Array2, array};
use pamm::io::{ClusterSet, GaussianClusterSet, VonMisesClusterSet, format_real};
use pamm::{GaussianCluster, MixtureComponent, VonMisesCluster};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::f64::consts::TAU;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn random_spd(rng: &mut StdRng, d: usize) -> Array2<f64> {
    let normal = Normal::new(0.0, 0.5).unwrap();
    let a = Array2::from_shape_fn((d, d), |_| normal.sample(rng));
    a.dot(&a.t()) + Array2::<f64>::eye(d)
}

#[test]
fn gaussian_set_survives_save_and_load() {
    let mut rng = StdRng::seed_from_u64(21);
    let clusters: Vec<GaussianCluster> = (0..5)
        .map(|_| {
            let mean = Array1::from_shape_fn(3, |_| rng.gen_range(-10.0..10.0));
            GaussianCluster::new_prepared(rng.gen_range(0.01..1.0), mean, random_spd(&mut rng, 3))
                .unwrap()
        })
        .collect();
    let original = ClusterSet::new("clusters from a seeded generator", clusters);

    let dir = tempdir().unwrap();
    let path = dir.path().join("clusters.pamm");
    original.save(&path).unwrap();
    let loaded = GaussianClusterSet::load(&path).unwrap();

    assert_eq!(loaded.comment, "# clusters from a seeded generator");
    assert_eq!(loaded.clusters.len(), original.clusters.len());
    for (a, b) in original.clusters.iter().zip(&loaded.clusters) {
        assert!(b.is_prepared());
        assert_relative_eq!(a.weight(), b.weight(), max_relative = 1e-8);
        for (x, y) in a.mean().iter().zip(b.mean().iter()) {
            assert_relative_eq!(*x, *y, max_relative = 1e-8);
        }
        for (x, y) in a.covariance().iter().zip(b.covariance().iter()) {
            assert_relative_eq!(*x, *y, max_relative = 1e-8);
        }
        assert_abs_diff_eq!(a.log_norm().unwrap(), b.log_norm().unwrap(), epsilon = 1e-6);
        assert_abs_diff_eq!(
            a.inverse_covariance().unwrap(),
            b.inverse_covariance().unwrap(),
            epsilon = 1e-6
        );
    }
}

#[test]
fn von_mises_set_keeps_periods() {
    let clusters = vec![
        VonMisesCluster::new_prepared(
            0.4,
            array![1.0, 0.25],
            array![[0.3, 0.05], [0.05, 0.2]],
            array![TAU, 1.0],
        )
        .unwrap(),
        VonMisesCluster::new_prepared(
            0.6,
            array![-2.0, 0.75],
            array![[0.5, 0.0], [0.0, 0.1]],
            array![TAU, 1.0],
        )
        .unwrap(),
    ];
    let original = ClusterSet::new("# torsions", clusters);

    let dir = tempdir().unwrap();
    let path = dir.path().join("torsions.pamm");
    original.save(&path).unwrap();
    let loaded = VonMisesClusterSet::load(&path).unwrap();

    assert_eq!(loaded.comment, "# torsions");
    for (a, b) in original.clusters.iter().zip(&loaded.clusters) {
        for (x, y) in a.period().iter().zip(b.period().iter()) {
            assert_relative_eq!(*x, *y, max_relative = 1e-8);
        }
        assert_abs_diff_eq!(a.log_norm().unwrap(), b.log_norm().unwrap(), epsilon = 1e-6);
        let x = array![0.9, 0.3];
        assert_abs_diff_eq!(
            a.log_density(x.view()).unwrap(),
            b.log_density(x.view()).unwrap(),
            epsilon = 1e-6
        );
    }
}

#[test]
fn empty_set_survives_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.pamm");
    VonMisesClusterSet::new("no clusters found", Vec::new())
        .save(&path)
        .unwrap();
    let loaded = VonMisesClusterSet::load(&path).unwrap();
    assert!(loaded.clusters.is_empty());
    assert_eq!(loaded.dimension(), None);
    assert_eq!(loaded.comment, "# no clusters found");
}

#[test]
fn predict_command_writes_one_row_per_point() {
    let dir = tempdir().unwrap();
    let clusters_path = dir.path().join("clusters.pamm");
    let points_path = dir.path().join("points.txt");
    let output_path = dir.path().join("posterior.txt");

    fs::write(
        &clusters_path,
        "# two unit clusters\n1 2\n1.0 -2.0 1.0\n1.0 2.0 1.0\n",
    )
    .unwrap();
    fs::write(&points_path, "0.0\n-2.0\n").unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_pamm"))
        .args([
            "predict",
            "--clusters",
            clusters_path.to_str().unwrap(),
            "--points",
            points_path.to_str().unwrap(),
            "--output",
            output_path.to_str().unwrap(),
        ])
        .status()
        .expect("run pamm cli");
    assert!(status.success(), "CLI exited with status {status:?}");

    let text = fs::read_to_string(&output_path).unwrap();
    let rows: Vec<Vec<&str>> = text.lines().map(|l| l.split_whitespace().collect()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], format_real(0.5).trim());
    assert_eq!(rows[0][1], format_real(0.5).trim());
    assert_eq!(rows[1][2], "1");
}

#[test]
fn predict_command_rejects_invalid_alpha() {
    let dir = tempdir().unwrap();
    let clusters_path = dir.path().join("clusters.pamm");
    let points_path = dir.path().join("points.txt");
    fs::write(&clusters_path, "#\n1 1\n1.0 0.0 1.0\n").unwrap();
    fs::write(&points_path, "0.0\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_pamm"))
        .args([
            "predict",
            "--clusters",
            clusters_path.to_str().unwrap(),
            "--points",
            points_path.to_str().unwrap(),
            "--alpha",
            "0",
        ])
        .output()
        .expect("run pamm cli");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));
}
