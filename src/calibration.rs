//! Fitted calibration models and the correction capability they share

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::info;
use nalgebra::{Matrix3x4, Vector3};

use crate::error::CalibrationError;
use crate::math::homogeneous;
use crate::normal_equations::OperatorBlocks;
use crate::record::{RecordReader, numeric_tokens, parse_field};
use crate::types::{MAX_POLYNOMIAL_ORDER, PARAMETERS_PER_DEGREE};

/// Runtime correction of triaxial readings
///
/// Implemented by [`PolynomialCalibration`] (temperature-dependent matrix and
/// offset) and [`crate::OffsetCalibration`] (constant offset). Each family has
/// its own record layout.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use triaxial_calibration::{OffsetCalibration, PolynomialCalibration, TriaxialCorrection};
///
/// let models: Vec<Box<dyn TriaxialCorrection>> = vec![
///     Box::new(PolynomialCalibration::identity()),
///     Box::new(OffsetCalibration::new(Vector3::new(0.0, 0.0, -1.0))),
/// ];
/// for model in &models {
///     let corrected = model.correct(Vector3::new(0.0, 0.0, 1.0), 25.0);
///     assert!(corrected.z <= 1.0);
/// }
/// ```
pub trait TriaxialCorrection {
    /// Corrected reading for a raw reading taken at `temperature`
    fn correct(&self, reading: Vector3<f64>, temperature: f64) -> Vector3<f64>;

    /// Write this model's text record
    fn write_record(&self, writer: &mut dyn Write) -> Result<(), CalibrationError>;

    /// Parse a text record of this family
    fn read_record<R: BufRead>(reader: R) -> Result<Self, CalibrationError>
    where
        Self: Sized;

    /// Write the record to a file, replacing any existing content
    fn save(&self, path: &Path) -> Result<(), CalibrationError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_record(&mut writer)?;
        writer.flush()?;
        info!("saved calibration to {}", path.display());
        Ok(())
    }

    /// Read a record from a file
    fn load(path: &Path) -> Result<Self, CalibrationError>
    where
        Self: Sized,
    {
        let model = Self::read_record(BufReader::new(File::open(path)?))?;
        info!("loaded calibration from {}", path.display());
        Ok(model)
    }
}

/// Temperature-dependent triaxial calibration
///
/// Holds `N+1` parameter blocks `(K11, K21, K22, K31, K32, K33, c1, c2, c3)`,
/// one per power of temperature. The correction at temperature `T` is
///
/// ```text
/// corrected = K(T) · reading + c(T),   K(T) = Σₙ Tⁿ K⁽ⁿ⁾,   c(T) = Σₙ Tⁿ c⁽ⁿ⁾
/// ```
///
/// with `K(T)` lower triangular. Models are immutable once built.
///
/// # Record layout
/// ```text
/// N temperatureMin temperatureMax
/// K11 K21 K22 K31 K32 K33 c1 c2 c3      (degree 0)
/// ...                                   (one line per degree up to N)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialCalibration {
    coefficients: Vec<f64>,
    operator: OperatorBlocks,
    temperature_min: f64,
    temperature_max: f64,
}

impl PolynomialCalibration {
    /// Order-0 model that leaves readings unchanged
    pub fn identity() -> Self {
        Self::from_parts(vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0], None)
    }

    /// Build a model from raw coefficients
    ///
    /// # Errors
    /// [`CalibrationError::InvalidConfiguration`] unless the slice holds
    /// `9(N+1)` values for some `N <= MAX_POLYNOMIAL_ORDER`.
    ///
    /// # Example
    /// ```
    /// use nalgebra::Vector3;
    /// use triaxial_calibration::{PolynomialCalibration, TriaxialCorrection};
    ///
    /// // Scale by 2 and shift x by 0.5 at every temperature
    /// let model = PolynomialCalibration::from_coefficients(&[
    ///     2.0, 0.0, 2.0, 0.0, 0.0, 2.0, 0.5, 0.0, 0.0,
    /// ]).unwrap();
    /// let corrected = model.correct(Vector3::new(1.0, 1.0, 1.0), -10.0);
    /// assert_eq!(corrected, Vector3::new(2.5, 2.0, 2.0));
    /// ```
    pub fn from_coefficients(coefficients: &[f64]) -> Result<Self, CalibrationError> {
        let len = coefficients.len();
        if len == 0 || len % PARAMETERS_PER_DEGREE != 0 {
            return Err(CalibrationError::InvalidConfiguration(format!(
                "coefficient count {len} is not a positive multiple of {PARAMETERS_PER_DEGREE}"
            )));
        }
        let order = len / PARAMETERS_PER_DEGREE - 1;
        if order > MAX_POLYNOMIAL_ORDER {
            return Err(CalibrationError::InvalidConfiguration(format!(
                "polynomial order {order} exceeds the maximum of {MAX_POLYNOMIAL_ORDER}"
            )));
        }
        Ok(Self::from_parts(coefficients.to_vec(), None))
    }

    pub(crate) fn from_parts(coefficients: Vec<f64>, temperature_range: Option<(f64, f64)>) -> Self {
        let (temperature_min, temperature_max) = temperature_range.unwrap_or((0.0, 0.0));
        Self {
            operator: OperatorBlocks::from_parameters(&coefficients),
            coefficients,
            temperature_min,
            temperature_max,
        }
    }

    /// Replace the recorded temperature range
    pub fn with_temperature_range(mut self, min: f64, max: f64) -> Self {
        self.temperature_min = min;
        self.temperature_max = max;
        self
    }

    /// Degree N of the temperature polynomial
    pub fn polynomial_order(&self) -> usize {
        self.coefficients.len() / PARAMETERS_PER_DEGREE - 1
    }

    /// All `9(N+1)` coefficients, degree 0 first
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Temperature range the calibration data covered, `(min, max)`
    ///
    /// Bookkeeping only: [`TriaxialCorrection::correct`] does not check it.
    pub fn temperature_range(&self) -> (f64, f64) {
        (self.temperature_min, self.temperature_max)
    }

    /// Whether `temperature` lies inside the recorded range (inclusive)
    pub fn is_within_range(&self, temperature: f64) -> bool {
        (self.temperature_min..=self.temperature_max).contains(&temperature)
    }

    /// Correction operator `A(T)`: lower-triangular matrix plus offset column
    pub fn operator_at(&self, temperature: f64) -> Matrix3x4<f64> {
        self.operator.evaluate(temperature)
    }
}

impl Default for PolynomialCalibration {
    fn default() -> Self {
        Self::identity()
    }
}

impl TriaxialCorrection for PolynomialCalibration {
    fn correct(&self, reading: Vector3<f64>, temperature: f64) -> Vector3<f64> {
        self.operator.evaluate(temperature) * homogeneous(&reading)
    }

    fn write_record(&self, writer: &mut dyn Write) -> Result<(), CalibrationError> {
        writeln!(
            writer,
            "{} {:?} {:?}",
            self.polynomial_order(),
            self.temperature_min,
            self.temperature_max
        )?;
        for block in self.coefficients.chunks_exact(PARAMETERS_PER_DEGREE) {
            let line: Vec<String> = block.iter().map(|value| format!("{value:?}")).collect();
            writeln!(writer, "{}", line.join(" "))?;
        }
        Ok(())
    }

    fn read_record<R: BufRead>(reader: R) -> Result<Self, CalibrationError> {
        let mut reader = RecordReader::new(reader);

        let (line, header) = reader.next_line("a header")?;
        let mut fields = header.split_whitespace();
        let order: usize = parse_field(fields.next(), "polynomial order", line)?;
        let temperature_min: f64 = parse_field(fields.next(), "minimum temperature", line)?;
        let temperature_max: f64 = parse_field(fields.next(), "maximum temperature", line)?;
        if order > MAX_POLYNOMIAL_ORDER {
            return Err(CalibrationError::malformed(
                line,
                format!("polynomial order {order} exceeds the maximum of {MAX_POLYNOMIAL_ORDER}"),
            ));
        }

        let mut coefficients = Vec::with_capacity(PARAMETERS_PER_DEGREE * (order + 1));
        for degree in 0..=order {
            let (line, text) = reader.next_line(&format!("coefficients for degree {degree}"))?;
            let values = numeric_tokens(&text);
            if values.len() != PARAMETERS_PER_DEGREE {
                return Err(CalibrationError::malformed(
                    line,
                    format!(
                        "expected {PARAMETERS_PER_DEGREE} values, found {}",
                        values.len()
                    ),
                ));
            }
            coefficients.extend(values);
        }

        Ok(Self::from_parts(
            coefficients,
            Some((temperature_min, temperature_max)),
        ))
    }
}
