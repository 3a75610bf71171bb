//! Gauss-Newton normal equations of the norm-constraint fit
//!
//! The fit minimizes `Σ w (y² − ‖A(T) x̃‖²)²` over the polynomial operator
//! `A(T) = Σₙ Tⁿ A[n]`. Both the gradient `JᵀW(y² − f)` and the Gauss-Newton
//! matrix `JᵀWJ` are contractions of the accumulated moment tensors with the
//! current operator blocks, so no raw sample is ever revisited.

use nalgebra::{DMatrix, DVector, Matrix3x4, Matrix4};

use crate::statistics::SufficientStatistics;
use crate::types::PARAMETERS_PER_DEGREE;

/// `(row, column)` of each parameter inside a 3x4 operator block
///
/// Lower-triangular matrix entries first (K11, K21, K22, K31, K32, K33),
/// then the offset column (c1, c2, c3).
pub const PARAMETER_SLOTS: [(usize, usize); PARAMETERS_PER_DEGREE] = [
    (0, 0),
    (1, 0),
    (1, 1),
    (2, 0),
    (2, 1),
    (2, 2),
    (0, 3),
    (1, 3),
    (2, 3),
];

/// Indices of K11, K22 and K33 within a parameter block
pub const DIAGONAL_PARAMETERS: [usize; 3] = [0, 2, 5];

/// Per-degree operator matrices `A[n]`, `n = 0..=N`
///
/// `A(T) x̃` is the corrected reading at temperature `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorBlocks {
    blocks: Vec<Matrix3x4<f64>>,
}

impl OperatorBlocks {
    /// Build the operator blocks from a parameter vector
    ///
    /// `parameters` holds `N+1` consecutive blocks of 9 values; a trailing
    /// partial block is ignored.
    pub fn from_parameters(parameters: &[f64]) -> Self {
        let blocks = parameters
            .chunks_exact(PARAMETERS_PER_DEGREE)
            .map(|block| {
                let mut a = Matrix3x4::zeros();
                for (&(row, col), &value) in PARAMETER_SLOTS.iter().zip(block) {
                    a[(row, col)] = value;
                }
                a
            })
            .collect();
        Self { blocks }
    }

    /// Polynomial order N
    pub fn order(&self) -> usize {
        self.blocks.len().saturating_sub(1)
    }

    /// Block `A[n]`
    pub fn block(&self, n: usize) -> &Matrix3x4<f64> {
        &self.blocks[n]
    }

    /// Evaluate the polynomial operator `A(T)` by Horner's rule
    pub fn evaluate(&self, temperature: f64) -> Matrix3x4<f64> {
        self.blocks
            .iter()
            .rev()
            .fold(Matrix3x4::zeros(), |acc, block| acc * temperature + block)
    }
}

/// Gradient vector and Gauss-Newton matrix for one iterate
#[derive(Debug, Clone)]
pub struct NormalEquations {
    /// `JᵀW(y² − f)`, length `9(N+1)`
    pub gradient: DVector<f64>,
    /// `JᵀWJ`, symmetric `9(N+1) x 9(N+1)`
    pub matrix: DMatrix<f64>,
}

impl NormalEquations {
    /// Assemble the normal equations at the iterate described by `operator`
    ///
    /// Both quantities are averages over the ingested samples (the total
    /// weight divides out of the Gauss-Newton step).
    pub fn build(operator: &OperatorBlocks, stats: &SufficientStatistics) -> Self {
        debug_assert_eq!(operator.order(), stats.order());
        Self {
            gradient: gradient(operator, stats),
            matrix: gauss_newton_matrix(operator, stats),
        }
    }
}

/// `Σ_{n+l=m} A[n]ᵀ A[l]` for `m = 0..=2N`
///
/// Coefficient of `Tᵐ` in `A(T)ᵀ A(T)`, the quadratic form giving the
/// predicted squared norm `x̃ᵀ A(T)ᵀ A(T) x̃`.
fn squared_norm_forms(operator: &OperatorBlocks) -> Vec<Matrix4<f64>> {
    let order = operator.order();
    let mut forms = vec![Matrix4::zeros(); 2 * order + 1];
    for n in 0..=order {
        for l in 0..=order {
            forms[n + l] += operator.block(n).transpose() * operator.block(l);
        }
    }
    forms
}

/// Residual moments `R[d]`, `d = 0..=2N`
///
/// `R[d][j][b] = Y2[d][j][b] − Σₘ Σ_{p,q} P[m][p][q] · X4[d+m][j][b][p][q]`:
/// the weighted average of `(y² − ‖A(T)x̃‖²) · x̃ⱼ · x̃_b · Tᵈ`.
fn residual_moments(operator: &OperatorBlocks, stats: &SufficientStatistics) -> Vec<Matrix4<f64>> {
    let forms = squared_norm_forms(operator);
    (0..stats.y2_degrees())
        .map(|d| {
            Matrix4::from_fn(|j, b| {
                let mut predicted = 0.0;
                for (m, form) in forms.iter().enumerate() {
                    for p in 0..4 {
                        for q in 0..4 {
                            predicted += form[(p, q)] * stats.x4(d + m, j, b, p, q);
                        }
                    }
                }
                stats.y2(d, j, b) - predicted
            })
        })
        .collect()
}

fn gradient(operator: &OperatorBlocks, stats: &SufficientStatistics) -> DVector<f64> {
    let order = operator.order();
    let residuals = residual_moments(operator, stats);
    let mut gradient = DVector::zeros(PARAMETERS_PER_DEGREE * (order + 1));

    for g in 0..=order {
        // Σ_{n2} A[n2] R[n2+g], entry (a, b) is the derivative along A[g][a][b]
        let mut projected = Matrix3x4::zeros();
        for n2 in 0..=order {
            projected += operator.block(n2) * residuals[n2 + g];
        }
        for (s, &(a, b)) in PARAMETER_SLOTS.iter().enumerate() {
            gradient[g * PARAMETERS_PER_DEGREE + s] = 2.0 * projected[(a, b)];
        }
    }

    gradient
}

fn gauss_newton_matrix(operator: &OperatorBlocks, stats: &SufficientStatistics) -> DMatrix<f64> {
    let order = operator.order();
    let size = PARAMETERS_PER_DEGREE * (order + 1);
    let mut matrix = DMatrix::zeros(size, size);

    for row in 0..size {
        let (g1, (a1, b1)) = parameter_at(row);
        for col in row..size {
            let (g2, (a2, b2)) = parameter_at(col);
            let mut sum = 0.0;
            for n1 in 0..=order {
                let block1 = operator.block(n1);
                for n2 in 0..=order {
                    let block2 = operator.block(n2);
                    let degree = n1 + g1 + n2 + g2;
                    for j1 in 0..4 {
                        let left = block1[(a1, j1)];
                        if left == 0.0 {
                            continue;
                        }
                        for j2 in 0..4 {
                            sum += left * block2[(a2, j2)] * stats.x4(degree, j1, b1, j2, b2);
                        }
                    }
                }
            }
            matrix[(row, col)] = 4.0 * sum;
            matrix[(col, row)] = 4.0 * sum;
        }
    }

    matrix
}

/// Temperature degree and block slot of a flat parameter index
#[inline]
fn parameter_at(index: usize) -> (usize, (usize, usize)) {
    (
        index / PARAMETERS_PER_DEGREE,
        PARAMETER_SLOTS[index % PARAMETERS_PER_DEGREE],
    )
}
