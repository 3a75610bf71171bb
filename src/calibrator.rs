//! Calibration fitting: sample ingestion and the iterative solver

use log::{debug, info, trace, warn};
use nalgebra::{DVector, Vector3};

use crate::calibration::PolynomialCalibration;
use crate::error::CalibrationError;
use crate::math::cholesky_solve;
use crate::normal_equations::{DIAGONAL_PARAMETERS, NormalEquations, OperatorBlocks};
use crate::statistics::SufficientStatistics;
use crate::types::{CalibratorSettings, PARAMETERS_PER_DEGREE};

/// Diagnostics of the most recent successful fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSummary {
    /// Iterations executed, including the one that triggered a stop
    pub iterations: usize,
    /// Squared norm of the smallest step, taken from the published iterate
    pub best_step_norm_squared: f64,
    /// Whether the stall bound (or a non-finite step) ended the fit before
    /// the iteration cap
    pub stopped_early: bool,
}

/// Temperature-dependent triaxial calibrator
///
/// Samples are folded into [`SufficientStatistics`] as they arrive; nothing
/// else is retained. [`Calibrator::calibrate`] then fits the
/// `9(N+1)` parameters by Gauss-Newton iteration on the normal equations
/// built from those statistics.
///
/// The fit starts from the identity correction. Each iteration solves
/// `JᵀWJ · Δ = JᵀW(y² − f)` by Cholesky factorization and steps
/// `z ← z + Δ`. Steps are undamped, so the published parameters are the
/// iterate with the smallest step seen, not the last one. After every step
/// the degree-0 diagonal entries are forced non-negative since the squared
/// norm criterion cannot tell their sign.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use triaxial_calibration::{Calibrator, TriaxialCorrection};
///
/// let mut calibrator = Calibrator::new();
/// // Readings of a unit field along many directions, all scaled by 2
/// for i in 0..200 {
///     let theta = i as f64 * 0.61;
///     let phi = i as f64 * 0.37;
///     let direction = Vector3::new(theta.cos() * phi.sin(), theta.sin() * phi.sin(), phi.cos());
///     calibrator.ingest(1.0, direction * 2.0, 25.0, 1.0).unwrap();
/// }
///
/// let calibration = calibrator.calibrate().unwrap();
/// let corrected = calibration.correct(Vector3::new(0.0, 2.0, 0.0), 25.0);
/// assert!((corrected.norm() - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct Calibrator {
    settings: CalibratorSettings,
    statistics: SufficientStatistics,
    summary: Option<FitSummary>,
}

impl Calibrator {
    /// Calibrator with default settings (order 0)
    pub fn new() -> Self {
        let settings = CalibratorSettings::default();
        Self {
            statistics: SufficientStatistics::new(settings.polynomial_order),
            settings,
            summary: None,
        }
    }

    /// Calibrator with the given settings
    ///
    /// # Errors
    /// [`CalibrationError::InvalidConfiguration`] if the settings fail
    /// [`CalibratorSettings::validate`].
    pub fn with_settings(settings: CalibratorSettings) -> Result<Self, CalibrationError> {
        settings.validate()?;
        Ok(Self {
            statistics: SufficientStatistics::new(settings.polynomial_order),
            settings,
            summary: None,
        })
    }

    /// Switch to a new polynomial order
    ///
    /// Reallocates and zeroes the statistics, discarding all ingested data.
    /// The iteration limits are kept.
    pub fn configure(&mut self, polynomial_order: usize) -> Result<(), CalibrationError> {
        let settings = CalibratorSettings {
            polynomial_order,
            ..self.settings
        };
        settings.validate()?;
        debug!("configuring calibrator for polynomial order {polynomial_order}");
        self.settings = settings;
        self.statistics = SufficientStatistics::new(polynomial_order);
        self.summary = None;
        Ok(())
    }

    /// Discard ingested data, keeping the configuration
    pub fn reset(&mut self) {
        self.statistics.reset();
        self.summary = None;
    }

    /// Current settings
    pub fn settings(&self) -> CalibratorSettings {
        self.settings
    }

    /// Degree of the temperature polynomial being fitted
    pub fn polynomial_order(&self) -> usize {
        self.settings.polynomial_order
    }

    /// Accumulated sufficient statistics
    pub fn statistics(&self) -> &SufficientStatistics {
        &self.statistics
    }

    /// Sum of ingested weights
    pub fn total_weight(&self) -> f64 {
        self.statistics.total_weight()
    }

    /// Number of ingested samples with positive weight
    pub fn sample_count(&self) -> usize {
        self.statistics.sample_count()
    }

    /// Add one calibration sample
    ///
    /// # Arguments
    /// * `weight` - Relative confidence in the sample, finite and non-negative
    /// * `reading` - Raw triaxial reading
    /// * `temperature` - Sensor temperature for the reading
    /// * `target_squared` - Squared magnitude the corrected reading should
    ///   have (e.g. local gravity or field strength squared)
    ///
    /// # Errors
    /// [`CalibrationError::InvalidSample`] for a negative or non-finite weight.
    pub fn ingest(
        &mut self,
        weight: f64,
        reading: Vector3<f64>,
        temperature: f64,
        target_squared: f64,
    ) -> Result<(), CalibrationError> {
        self.statistics
            .ingest(weight, reading, temperature, target_squared)
    }

    /// Fit the calibration to the ingested samples
    ///
    /// Ingested data is kept, so more samples can be added and the fit rerun.
    ///
    /// # Errors
    /// * [`CalibrationError::SingularNormalMatrix`] when the data cannot
    ///   determine `9(N+1)` parameters, including when nothing was ingested
    /// * [`CalibrationError::NoConvergence`] when no iteration produced a
    ///   finite step
    pub fn calibrate(&mut self) -> Result<PolynomialCalibration, CalibrationError> {
        debug!(
            "fitting order {} calibration to {} samples (total weight {})",
            self.settings.polynomial_order,
            self.statistics.sample_count(),
            self.statistics.total_weight()
        );

        self.summary = None;
        let (parameters, summary) = fit(&self.statistics, &self.settings)?;
        info!(
            "calibration fit finished after {} iterations (step norm² {:e}{})",
            summary.iterations,
            summary.best_step_norm_squared,
            if summary.stopped_early { ", stopped early" } else { "" }
        );
        self.summary = Some(summary);

        Ok(PolynomialCalibration::from_parts(
            parameters.as_slice().to_vec(),
            self.statistics.temperature_range(),
        ))
    }

    /// Diagnostics of the last successful [`Calibrator::calibrate`] call
    pub fn fit_summary(&self) -> Option<FitSummary> {
        self.summary
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity correction at degree 0, zero for every higher degree
fn initial_parameters(order: usize) -> DVector<f64> {
    let mut parameters = DVector::zeros(PARAMETERS_PER_DEGREE * (order + 1));
    for &index in &DIAGONAL_PARAMETERS {
        parameters[index] = 1.0;
    }
    parameters
}

fn fit(
    statistics: &SufficientStatistics,
    settings: &CalibratorSettings,
) -> Result<(DVector<f64>, FitSummary), CalibrationError> {
    let mut iterate = initial_parameters(settings.polynomial_order);
    let mut best: Option<DVector<f64>> = None;
    let mut min_error = f64::INFINITY;
    let mut without_improvement = 0;
    let mut iterations = 0;
    let mut stopped_early = false;

    for iteration in 0..settings.max_iterations {
        iterations = iteration + 1;

        let operator = OperatorBlocks::from_parameters(iterate.as_slice());
        let NormalEquations { gradient, matrix } = NormalEquations::build(&operator, statistics);
        let step = cholesky_solve(matrix, gradient).map_err(|failure| {
            warn!(
                "normal matrix not positive definite at iteration {iteration} (column {}, pivot {:e})",
                failure.column, failure.pivot
            );
            CalibrationError::SingularNormalMatrix {
                iteration,
                pivot: failure.pivot,
            }
        })?;

        let error = step.norm_squared();
        trace!("iteration {iteration}: step norm² {error:e}");
        if !error.is_finite() {
            warn!("non-finite step at iteration {iteration}, stopping");
            stopped_early = true;
            break;
        }

        if error < min_error {
            best = Some(iterate.clone());
            min_error = error;
            without_improvement = 0;
        } else {
            without_improvement += 1;
            if without_improvement > settings.max_iterations_without_improvement {
                stopped_early = true;
                break;
            }
        }

        iterate += step;
        for &index in &DIAGONAL_PARAMETERS {
            iterate[index] = iterate[index].abs();
        }
    }

    match best {
        Some(parameters) => Ok((
            parameters,
            FitSummary {
                iterations,
                best_step_norm_squared: min_error,
                stopped_early,
            },
        )),
        None => {
            warn!("calibration fit produced no finite step");
            Err(CalibrationError::NoConvergence { iterations })
        }
    }
}
