// ========================================================================================
//
//                          PAMM: CLUSTER ASSIGNMENT FRONT END
//
// ========================================================================================
//
// A thin driver over the library. It loads a prepared cluster set, evaluates the
// posterior membership of query points one at a time, and writes one line per point.
// Deciding the clusters themselves is the job of the outer PAMM pipeline.

use clap::{Parser, Subcommand};
use pamm::config::{ClusterKind, PammConfig};
use pamm::io::{ClusterRecord, ClusterSet, format_real, load_points};
use pamm::posterior::{PosteriorParams, posterior, strongest_assignment};
use pamm::{GaussianCluster, MixtureComponent, VonMisesCluster};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(
    name = "pamm",
    about = "Evaluate PAMM Gaussian or von Mises cluster sets",
    long_about = "Reads a cluster file in the PAMM columnar format and computes soft cluster \
                  membership probabilities for query points."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute posterior cluster probabilities for every query point
    #[command(about = "Soft-assign points to clusters (outputs: one row per point)")]
    Predict {
        /// Cluster file written by the PAMM pipeline
        #[arg(long)]
        clusters: PathBuf,

        /// Whitespace-separated query points, one per line
        #[arg(long)]
        points: PathBuf,

        /// Treat the cluster file as von Mises clusters with trailing periods
        #[arg(long)]
        von_mises: bool,

        /// Smoothing exponent; overrides the config file
        #[arg(long)]
        alpha: Option<f64>,

        /// Null-hypothesis weight; overrides the config file
        #[arg(long)]
        zeta: Option<f64>,

        /// TOML file with `kind` and `[posterior]` settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write results here instead of standard output
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the prepared normalization of every cluster
    Inspect {
        #[arg(long)]
        clusters: PathBuf,

        #[arg(long)]
        von_mises: bool,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Predict {
            clusters,
            points,
            von_mises,
            alpha,
            zeta,
            config,
            output,
        } => resolve_config(config.as_deref(), von_mises, alpha, zeta).and_then(|settings| {
            match settings.kind {
                ClusterKind::Gaussian => predict_command::<GaussianCluster>(
                    &clusters,
                    &points,
                    &settings.posterior,
                    output.as_deref(),
                ),
                ClusterKind::VonMises => predict_command::<VonMisesCluster>(
                    &clusters,
                    &points,
                    &settings.posterior,
                    output.as_deref(),
                ),
            }
        }),
        Commands::Inspect {
            clusters,
            von_mises,
            config,
        } => resolve_config(config.as_deref(), von_mises, None, None).and_then(|settings| {
            match settings.kind {
                ClusterKind::Gaussian => inspect_command::<GaussianCluster>(&clusters, |c| {
                    format!(
                        "log_norm={} det={}",
                        format_real(c.log_norm().unwrap_or(f64::NAN)),
                        format_real(c.determinant().unwrap_or(f64::NAN))
                    )
                }),
                ClusterKind::VonMises => inspect_command::<VonMisesCluster>(&clusters, |c| {
                    format!("log_norm={}", format_real(c.log_norm().unwrap_or(f64::NAN)))
                }),
            }
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Config file values first, then command-line overrides.
fn resolve_config(
    path: Option<&Path>,
    von_mises: bool,
    alpha: Option<f64>,
    zeta: Option<f64>,
) -> Result<PammConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => PammConfig::load(path)?,
        None => PammConfig::default(),
    };
    if von_mises {
        config.kind = ClusterKind::VonMises;
    }
    config.posterior = PosteriorParams::new(
        alpha.unwrap_or(config.posterior.alpha),
        zeta.unwrap_or(config.posterior.zeta),
    )?;
    log::info!(
        "Using {:?} clusters with alpha={} zeta={}",
        config.kind,
        config.posterior.alpha,
        config.posterior.zeta
    );
    Ok(config)
}

fn predict_command<C: ClusterRecord + MixtureComponent>(
    clusters_path: &Path,
    points_path: &Path,
    params: &PosteriorParams,
    output_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let set = ClusterSet::<C>::load(clusters_path)?;
    let points = load_points(points_path)?;
    log::info!(
        "Evaluating {} points against {} clusters",
        points.nrows(),
        set.clusters.len()
    );

    let mut out: Box<dyn Write> = match output_path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    for point in points.outer_iter() {
        let p = posterior(point, &set.clusters, params)?;
        let best = strongest_assignment(p.view()).map_or(0, |(k, _)| k + 1);
        let row: Vec<String> = p.iter().map(|&v| format_real(v)).collect();
        writeln!(out, "{} {best}", row.join(" "))?;
    }
    out.flush()?;
    Ok(())
}

fn inspect_command<C: ClusterRecord + MixtureComponent>(
    clusters_path: &Path,
    describe: impl Fn(&C) -> String,
) -> Result<(), Box<dyn std::error::Error>> {
    let set = ClusterSet::<C>::load(clusters_path)?;
    println!(
        "{} {} clusters, dimension {}",
        set.clusters.len(),
        C::KIND,
        set.dimension().unwrap_or(0)
    );
    for (k, cluster) in set.clusters.iter().enumerate() {
        println!(
            "{:>4} weight={} {}",
            k + 1,
            format_real(cluster.weight()),
            describe(cluster)
        );
    }
    Ok(())
}
