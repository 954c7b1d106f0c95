//! # Cluster File Input and Output
//!
//! Reads and writes cluster parameter sets in the PAMM columnar text format:
//!
//! ```text
//! # one or more comment lines
//! D K
//! weight mean[1..D] cov[1..D,1..D] (row-major) [period[1..D]]
//! ...                                           (K rows)
//! ```
//!
//! Numbers are written as 21-character scientific tokens with 8 fractional digits.
//! Every cluster is prepared as soon as it is read, so a loaded set is ready for
//! evaluation. Point files for queries are plain whitespace-separated rows.

use crate::component::{ClusterError, MixtureComponent};
use crate::gaussian::GaussianCluster;
use crate::von_mises::VonMisesCluster;
use ndarray::{Array1, Array2};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Width of a single numeric token.
pub const FIELD_WIDTH: usize = 21;
/// Fractional mantissa digits of a numeric token.
pub const FIELD_PRECISION: usize = 8;

#[derive(Error, Debug)]
pub enum ClusterFileError {
    #[error("Failed to read or write cluster file: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed input at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("Input ended before the 'D K' header line.")]
    MissingHeader,

    #[error("Invalid cluster at line {line}: {source}")]
    Cluster {
        line: usize,
        #[source]
        source: ClusterError,
    },
}

fn format_error(line: usize, message: impl Into<String>) -> ClusterFileError {
    ClusterFileError::Format {
        line,
        message: message.into(),
    }
}

/// A comment header plus the clusters it describes.
#[derive(Debug, Clone)]
pub struct ClusterSet<C> {
    pub comment: String,
    pub clusters: Vec<C>,
}

pub type GaussianClusterSet = ClusterSet<GaussianCluster>;
pub type VonMisesClusterSet = ClusterSet<VonMisesCluster>;

impl<C: ClusterRecord> ClusterSet<C> {
    pub fn new(comment: impl Into<String>, clusters: Vec<C>) -> Self {
        Self {
            comment: comment.into(),
            clusters,
        }
    }

    /// Common dimension of the clusters, if any.
    pub fn dimension(&self) -> Option<usize> {
        self.clusters.first().map(C::record_dimension)
    }

    pub fn load(path: &Path) -> Result<Self, ClusterFileError> {
        let reader = BufReader::new(File::open(path)?);
        let set = read_clusters(reader)?;
        log::debug!(
            "Loaded {} {} clusters from {}",
            set.clusters.len(),
            C::KIND,
            path.display()
        );
        Ok(set)
    }

    pub fn save(&self, path: &Path) -> Result<(), ClusterFileError> {
        let mut writer = BufWriter::new(File::create(path)?);
        write_clusters(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// A cluster model that can be stored as one row of a cluster file.
pub trait ClusterRecord: Sized {
    const KIND: &'static str;

    /// Number of trailing per-axis fields after the covariance.
    const TRAILING_VECTORS: usize;

    fn record_dimension(&self) -> usize;

    /// Builds an unprepared cluster from the row fields.
    fn from_fields(dimension: usize, fields: &[f64]) -> Result<Self, ClusterError>;

    fn push_fields(&self, out: &mut Vec<f64>);

    fn prepare_record(&mut self) -> Result<(), ClusterError>;

    fn field_count(dimension: usize) -> usize {
        1 + dimension + dimension * dimension + Self::TRAILING_VECTORS * dimension
    }
}

fn split_gaussian_fields(
    dimension: usize,
    fields: &[f64],
) -> Result<(f64, Array1<f64>, Array2<f64>), ClusterError> {
    let weight = fields[0];
    let mean = Array1::from(fields[1..1 + dimension].to_vec());
    let cov_start = 1 + dimension;
    let covariance = Array2::from_shape_vec(
        (dimension, dimension),
        fields[cov_start..cov_start + dimension * dimension].to_vec(),
    )
    .map_err(|e| ClusterError::InvalidShape(e.to_string()))?;
    Ok((weight, mean, covariance))
}

impl ClusterRecord for GaussianCluster {
    const KIND: &'static str = "Gaussian";
    const TRAILING_VECTORS: usize = 0;

    fn record_dimension(&self) -> usize {
        self.mean().len()
    }

    fn from_fields(dimension: usize, fields: &[f64]) -> Result<Self, ClusterError> {
        let (weight, mean, covariance) = split_gaussian_fields(dimension, fields)?;
        GaussianCluster::new(weight, mean, covariance)
    }

    fn push_fields(&self, out: &mut Vec<f64>) {
        out.push(self.weight());
        out.extend(self.mean().iter());
        out.extend(self.covariance().iter());
    }

    fn prepare_record(&mut self) -> Result<(), ClusterError> {
        self.prepare()
    }
}

impl ClusterRecord for VonMisesCluster {
    const KIND: &'static str = "von Mises";
    const TRAILING_VECTORS: usize = 1;

    fn record_dimension(&self) -> usize {
        self.mean().len()
    }

    fn from_fields(dimension: usize, fields: &[f64]) -> Result<Self, ClusterError> {
        let (weight, mean, covariance) = split_gaussian_fields(dimension, fields)?;
        let period_start = 1 + dimension + dimension * dimension;
        let period = Array1::from(fields[period_start..period_start + dimension].to_vec());
        VonMisesCluster::new(weight, mean, covariance, period)
    }

    fn push_fields(&self, out: &mut Vec<f64>) {
        out.push(self.weight());
        out.extend(self.mean().iter());
        out.extend(self.covariance().iter());
        out.extend(self.period().iter());
    }

    fn prepare_record(&mut self) -> Result<(), ClusterError> {
        self.prepare()
    }
}

/// Formats a real as a right-aligned scientific token, e.g. `       1.25000000E-03`.
pub fn format_real(value: f64) -> String {
    let raw = format!("{value:.prec$E}", prec = FIELD_PRECISION);
    let token = match raw.split_once('E') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exp) => format!(
                "{mantissa}E{}{:02}",
                if exp < 0 { '-' } else { '+' },
                exp.abs()
            ),
            Err(_) => raw.clone(),
        },
        None => raw.clone(),
    };
    format!("{token:>width$}", width = FIELD_WIDTH)
}

/// Parses a numeric token; Fortran `D` exponents are accepted.
fn parse_real(token: &str, line: usize) -> Result<f64, ClusterFileError> {
    let parsed = if token.contains(['D', 'd']) {
        token.replace(['D', 'd'], "E").parse::<f64>()
    } else {
        token.parse::<f64>()
    };
    parsed.map_err(|_| format_error(line, format!("'{token}' is not a number")))
}

/// Iterator over `(1-based line number, line)` that stops at the first I/O error.
struct NumberedLines<R> {
    lines: io::Lines<R>,
    line: usize,
}

impl<R: BufRead> NumberedLines<R> {
    fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }

    fn next_line(&mut self) -> Result<Option<(usize, String)>, io::Error> {
        match self.lines.next() {
            Some(Ok(text)) => {
                self.line += 1;
                Ok(Some((self.line, text)))
            }
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Next line that is not blank.
    fn next_content(&mut self) -> Result<Option<(usize, String)>, io::Error> {
        while let Some((line, text)) = self.next_line()? {
            if !text.trim().is_empty() {
                return Ok(Some((line, text)));
            }
        }
        Ok(None)
    }
}

/// Reads a cluster set and prepares every cluster.
pub fn read_clusters<C: ClusterRecord, R: BufRead>(
    reader: R,
) -> Result<ClusterSet<C>, ClusterFileError> {
    let mut lines = NumberedLines::new(reader);
    let mut comment = Vec::new();

    let (header_line, header) = loop {
        match lines.next_content()? {
            Some((_, text)) if text.trim_start().starts_with('#') => comment.push(text),
            Some(found) => break found,
            None => return Err(ClusterFileError::MissingHeader),
        }
    };

    let header_tokens: Vec<&str> = header.split_whitespace().collect();
    if header_tokens.len() != 2 {
        return Err(format_error(
            header_line,
            format!(
                "expected 'D K' header with 2 fields, found {}",
                header_tokens.len()
            ),
        ));
    }
    let dimension: usize = header_tokens[0].parse().map_err(|_| {
        format_error(header_line, format!("invalid dimension '{}'", header_tokens[0]))
    })?;
    let count: usize = header_tokens[1].parse().map_err(|_| {
        format_error(header_line, format!("invalid cluster count '{}'", header_tokens[1]))
    })?;
    // An empty set is written with dimension 0.
    if dimension == 0 && count > 0 {
        return Err(format_error(header_line, "dimension must be at least 1"));
    }

    let expected_fields = C::field_count(dimension);
    let mut clusters = Vec::with_capacity(count);
    for index in 0..count {
        let (line, text) = lines.next_content()?.ok_or_else(|| {
            format_error(
                lines.line + 1,
                format!("expected {count} cluster rows, found only {index}"),
            )
        })?;
        let fields = text
            .split_whitespace()
            .map(|token| parse_real(token, line))
            .collect::<Result<Vec<f64>, _>>()?;
        if fields.len() != expected_fields {
            return Err(format_error(
                line,
                format!(
                    "expected {expected_fields} fields for a {dimension}-D {} cluster, found {}",
                    C::KIND,
                    fields.len()
                ),
            ));
        }
        let mut cluster = C::from_fields(dimension, &fields)
            .map_err(|source| ClusterFileError::Cluster { line, source })?;
        cluster
            .prepare_record()
            .map_err(|source| ClusterFileError::Cluster { line, source })?;
        clusters.push(cluster);
    }

    if let Some((line, _)) = lines.next_content()? {
        log::warn!("Ignoring trailing content after {count} clusters, starting at line {line}.");
    }

    Ok(ClusterSet {
        comment: comment.join("\n"),
        clusters,
    })
}

/// Writes the comment block, the `D K` header, and one row per cluster.
pub fn write_clusters<C: ClusterRecord, W: Write>(
    writer: &mut W,
    set: &ClusterSet<C>,
) -> Result<(), ClusterFileError> {
    let dimension = set.dimension().unwrap_or(0);
    if let Some((index, cluster)) = set
        .clusters
        .iter()
        .enumerate()
        .find(|(_, c)| c.record_dimension() != dimension)
    {
        return Err(ClusterFileError::Cluster {
            line: index + 1,
            source: ClusterError::DimensionMismatch {
                expected: dimension,
                found: cluster.record_dimension(),
            },
        });
    }

    if set.comment.is_empty() {
        writeln!(writer, "#")?;
    }
    for line in set.comment.lines() {
        if line.starts_with('#') {
            writeln!(writer, "{line}")?;
        } else {
            writeln!(writer, "# {line}")?;
        }
    }
    writeln!(writer, "{dimension} {}", set.clusters.len())?;

    let mut fields = Vec::with_capacity(C::field_count(dimension));
    for cluster in &set.clusters {
        fields.clear();
        cluster.push_fields(&mut fields);
        let row: Vec<String> = fields.iter().map(|&v| format_real(v)).collect();
        writeln!(writer, "{}", row.join(" "))?;
    }
    Ok(())
}

/// Reads query points, one per row, into an `N x D` matrix.
///
/// Lines starting with `#` and blank lines are skipped.
pub fn read_points<R: BufRead>(reader: R) -> Result<Array2<f64>, ClusterFileError> {
    let mut lines = NumberedLines::new(reader);
    let mut values = Vec::new();
    let mut width: Option<usize> = None;
    let mut rows = 0;

    while let Some((line, text)) = lines.next_content()? {
        if text.trim_start().starts_with('#') {
            continue;
        }
        let before = values.len();
        for token in text.split_whitespace() {
            values.push(parse_real(token, line)?);
        }
        let found = values.len() - before;
        match width {
            None => width = Some(found),
            Some(expected) if expected != found => {
                return Err(format_error(
                    line,
                    format!("expected {expected} coordinates, found {found}"),
                ));
            }
            Some(_) => {}
        }
        rows += 1;
    }

    let cols = width.unwrap_or(0);
    Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| format_error(lines.line, e.to_string()))
}

pub fn load_points(path: &Path) -> Result<Array2<f64>, ClusterFileError> {
    read_points(BufReader::new(File::open(path)?))
}
