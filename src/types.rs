//! Configuration types and tuning constants for the calibration library

use crate::error::CalibrationError;

/// Number of parameters per polynomial degree: six lower-triangular matrix
/// entries (K11, K21, K22, K31, K32, K33) followed by three offsets (c1, c2, c3).
pub const PARAMETERS_PER_DEGREE: usize = 9;

/// Highest polynomial order a calibrator or a persisted record may use.
///
/// The normal matrix grows as `9(N+1)` and its entries mix temperature powers
/// up to `T^(4N)`, so orders past this point are numerically meaningless.
pub const MAX_POLYNOMIAL_ORDER: usize = 8;

/// Default iteration cap of the fitting loop
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Default number of consecutive non-improving iterations tolerated
pub const DEFAULT_MAX_ITERATIONS_WITHOUT_IMPROVEMENT: usize = 20;

/// Calibrator settings
///
/// Controls the temperature model and the termination policy of the
/// iterative fit.
///
/// # Example
/// ```
/// use triaxial_calibration::{Calibrator, CalibratorSettings};
///
/// let settings = CalibratorSettings {
///     polynomial_order: 1,      // bias and scale vary linearly with temperature
///     max_iterations: 200,
///     ..Default::default()
/// };
/// let calibrator = Calibrator::with_settings(settings).unwrap();
/// assert_eq!(calibrator.polynomial_order(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibratorSettings {
    /// Degree of the temperature polynomial (0 = temperature independent)
    pub polynomial_order: usize,
    /// Hard cap on solver iterations
    ///
    /// The fit always stops after this many iterations, whether or not the
    /// step size is still shrinking.
    pub max_iterations: usize,
    /// Stall bound
    ///
    /// The fit stops early once the step norm has failed to improve on the
    /// best one seen for more than this many consecutive iterations.
    pub max_iterations_without_improvement: usize,
}

impl CalibratorSettings {
    /// Check the settings for values the calibrator cannot work with
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.polynomial_order > MAX_POLYNOMIAL_ORDER {
            return Err(CalibrationError::InvalidConfiguration(format!(
                "polynomial order {} exceeds the maximum of {}",
                self.polynomial_order, MAX_POLYNOMIAL_ORDER
            )));
        }
        if self.max_iterations == 0 {
            return Err(CalibrationError::InvalidConfiguration(
                "max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Number of fitted parameters, `9(N+1)`
    pub fn parameter_count(&self) -> usize {
        PARAMETERS_PER_DEGREE * (self.polynomial_order + 1)
    }
}

impl Default for CalibratorSettings {
    fn default() -> Self {
        Self {
            polynomial_order: 0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_iterations_without_improvement: DEFAULT_MAX_ITERATIONS_WITHOUT_IMPROVEMENT,
        }
    }
}
