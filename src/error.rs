//! Error type for calibration, fitting and persistence

use thiserror::Error;

/// Errors surfaced by the calibrator and by calibration records
///
/// Accumulation and correction only fail on input validation; fitting and
/// persistence carry the remaining variants.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// Settings the calibrator cannot work with (order too large, zero
    /// iteration cap, coefficient slice of the wrong length)
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Sample weight that is negative or not finite
    #[error("invalid sample weight {weight}: weights must be finite and non-negative")]
    InvalidSample { weight: f64 },

    /// Cholesky factorization hit a non-positive pivot
    ///
    /// The accumulated data does not determine the requested number of
    /// parameters (too few distinct directions or temperatures, or no data).
    #[error("normal matrix is not positive definite at iteration {iteration} (pivot {pivot:e})")]
    SingularNormalMatrix { iteration: usize, pivot: f64 },

    /// Every step of the fit was non-finite, so no iterate can be published
    #[error("fit produced no finite step in {iterations} iterations")]
    NoConvergence { iterations: usize },

    /// Persisted record does not match the expected line/field layout
    #[error("malformed calibration record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Storage access failure while saving or loading a record
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CalibrationError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }
}
