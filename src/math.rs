//! Numerical helpers: homogeneous readings, temperature powers and the
//! Cholesky solve used by the fitting loop

use nalgebra::{DMatrix, DVector, Vector3, Vector4};

/// Relative pivot tolerance of [`cholesky_solve`]
///
/// A pivot is rejected when it does not exceed this fraction of its own
/// column's original diagonal entry. Rank-deficient normal matrices leave
/// rounding-level residues on the diagonal instead of exact zeros.
pub(crate) const PIVOT_TOLERANCE: f64 = 64.0 * f64::EPSILON;

/// Extend a raw reading with a trailing 1
///
/// A single 3x4 operator applied to the homogeneous reading expresses both
/// the correction matrix and the additive offset.
#[inline]
pub(crate) fn homogeneous(reading: &Vector3<f64>) -> Vector4<f64> {
    Vector4::new(reading.x, reading.y, reading.z, 1.0)
}

/// Fill `powers` with `T^0, T^1, ..., T^(len-1)`
#[inline]
pub(crate) fn temperature_powers(temperature: f64, powers: &mut [f64]) {
    let mut tn = 1.0;
    for power in powers.iter_mut() {
        *power = tn;
        tn *= temperature;
    }
}

/// Cholesky factorization failure
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NonPositivePivot {
    /// Column at which factorization stopped
    pub(crate) column: usize,
    /// Offending pivot value (before the square root)
    pub(crate) pivot: f64,
}

/// Solve `S x = b` for a symmetric positive definite `S`
///
/// Factorizes `S = L Lᵀ` in place, then runs forward and backward
/// substitution on `b`. Only the lower triangle of `S` is read.
///
/// # Errors
/// Returns [`NonPositivePivot`] when a pivot is not strictly greater than
/// [`PIVOT_TOLERANCE`] times the magnitude of the same column's diagonal
/// entry in `S`. The test is unaffected by rescaling rows and columns, so
/// columns of very different magnitude (high temperature powers) are judged
/// on their own scale. A zero column always fails, as does any NaN.
pub(crate) fn cholesky_solve(
    mut s: DMatrix<f64>,
    mut b: DVector<f64>,
) -> Result<DVector<f64>, NonPositivePivot> {
    let n = s.nrows();
    debug_assert_eq!(n, s.ncols());
    debug_assert_eq!(n, b.len());

    for j in 0..n {
        let tolerance = PIVOT_TOLERANCE * s[(j, j)].abs();
        let mut pivot = s[(j, j)];
        for k in 0..j {
            pivot -= s[(j, k)] * s[(j, k)];
        }
        // Negated comparison so NaN is rejected as well
        if !(pivot > tolerance) {
            return Err(NonPositivePivot { column: j, pivot });
        }
        let diagonal = pivot.sqrt();
        s[(j, j)] = diagonal;

        for i in (j + 1)..n {
            let mut sum = s[(i, j)];
            for k in 0..j {
                sum -= s[(i, k)] * s[(j, k)];
            }
            s[(i, j)] = sum / diagonal;
        }
    }

    // L y = b
    for j in 0..n {
        let mut sum = b[j];
        for k in 0..j {
            sum -= s[(j, k)] * b[k];
        }
        b[j] = sum / s[(j, j)];
    }
    // Lᵀ x = y
    for j in (0..n).rev() {
        let mut sum = b[j];
        for k in (j + 1)..n {
            sum -= s[(k, j)] * b[k];
        }
        b[j] = sum / s[(j, j)];
    }

    Ok(b)
}
