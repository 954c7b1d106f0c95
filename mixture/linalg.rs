//! Dense linear-algebra primitives used by the cluster models.
//!
//! The determinant is computed locally by Gaussian elimination so that singular
//! matrices degrade to an exact `0.0`. Inversion and eigenvalues are delegated to
//! LAPACK through `ndarray-linalg`.

use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use ndarray_linalg::{EigVals, Inverse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinalgError {
    #[error("Expected a square matrix, but got shape {rows}x{cols}.")]
    NotSquare { rows: usize, cols: usize },

    #[error("Matrix of size {0}x{0} is singular and cannot be inverted.")]
    Singular(usize),

    #[error("Decomposition produced non-finite entries; the matrix is numerically singular.")]
    NonFinite,

    #[error("Dense decomposition failed: {0}")]
    Decomposition(#[from] ndarray_linalg::error::LinalgError),
}

fn ensure_square<S: Data<Elem = f64>>(m: &ArrayBase<S, Ix2>) -> Result<usize, LinalgError> {
    let (rows, cols) = m.dim();
    if rows != cols {
        return Err(LinalgError::NotSquare { rows, cols });
    }
    Ok(rows)
}

/// Determinant by elimination to upper-triangular form with row pivoting.
///
/// Returns exactly `0.0` when a column has no non-zero pivot candidate. Never fails:
/// a non-square input has no determinant and also yields `0.0`.
pub fn determinant<S: Data<Elem = f64>>(m: &ArrayBase<S, Ix2>) -> f64 {
    let n = match ensure_square(m) {
        Ok(n) => n,
        Err(_) => return 0.0,
    };
    if n == 0 {
        return 1.0;
    }

    let mut a = m.to_owned();
    let mut sign = 1.0;

    for col in 0..n {
        // Largest magnitude entry at or below the diagonal.
        let mut pivot_row = col;
        let mut pivot_abs = a[[col, col]].abs();
        for row in (col + 1)..n {
            let candidate = a[[row, col]].abs();
            if candidate > pivot_abs {
                pivot_row = row;
                pivot_abs = candidate;
            }
        }
        if pivot_abs == 0.0 {
            return 0.0;
        }
        if pivot_row != col {
            for k in 0..n {
                a.swap([col, k], [pivot_row, k]);
            }
            sign = -sign;
        }

        let pivot = a[[col, col]];
        for row in (col + 1)..n {
            let factor = a[[row, col]] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
        }
    }

    sign * a.diag().product()
}

/// Inverse of a square matrix through an LU factorization.
///
/// Singular input is reported as an error rather than propagated as NaN/Inf: an
/// exact zero pivot in the factorization gives [`LinalgError::Singular`], and an
/// inverse with non-finite entries gives [`LinalgError::NonFinite`].
pub fn inverse<S: Data<Elem = f64>>(
    m: &ArrayBase<S, Ix2>,
) -> Result<Array2<f64>, LinalgError> {
    let n = ensure_square(m)?;
    if n == 0 {
        return Ok(Array2::zeros((0, 0)));
    }

    // getrf reports a zero pivot through a positive info code. The input is an owned,
    // square, contiguous copy, so no other LAPACK failure is reachable here.
    let inv = m.to_owned().inv().map_err(|e| match e {
        ndarray_linalg::error::LinalgError::Lapack(_) => LinalgError::Singular(n),
        other => LinalgError::Decomposition(other),
    })?;
    if inv.iter().any(|v| !v.is_finite()) {
        return Err(LinalgError::NonFinite);
    }
    Ok(inv)
}

/// Real parts of the eigenvalues of a general square matrix.
///
/// The decomposition runs on an internal copy; `m` is left untouched.
pub fn eigenvalues<S: Data<Elem = f64>>(
    m: &ArrayBase<S, Ix2>,
) -> Result<Array1<f64>, LinalgError> {
    let n = ensure_square(m)?;
    if n == 0 {
        return Ok(Array1::zeros(0));
    }
    let values = m.eigvals()?;
    Ok(values.mapv(|z| z.re))
}

/// Sum of the diagonal entries.
pub fn trace<S: Data<Elem = f64>>(m: &ArrayBase<S, Ix2>) -> Result<f64, LinalgError> {
    ensure_square(m)?;
    Ok(m.diag().sum())
}
