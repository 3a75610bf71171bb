//! Offset-only triaxial calibration

use std::io::{BufRead, Write};

use nalgebra::Vector3;

use crate::calibration::TriaxialCorrection;
use crate::error::CalibrationError;
use crate::record::{RecordReader, parse_field};

/// Constant additive correction
///
/// Adds a fixed offset to every reading, independent of temperature. Its
/// record is three lines holding the X, Y and Z offsets.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use triaxial_calibration::{OffsetCalibration, TriaxialCorrection};
///
/// let calibration = OffsetCalibration::new(Vector3::new(-0.1, 0.2, 0.0));
/// let corrected = calibration.correct(Vector3::new(1.0, 1.0, 1.0), 30.0);
/// assert!((corrected - Vector3::new(0.9, 1.2, 1.0)).norm() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetCalibration {
    offset: Vector3<f64>,
}

impl OffsetCalibration {
    /// Calibration adding `offset` to every reading
    pub fn new(offset: Vector3<f64>) -> Self {
        Self { offset }
    }

    /// Offset added by [`TriaxialCorrection::correct`]
    pub fn offset(&self) -> Vector3<f64> {
        self.offset
    }
}

impl Default for OffsetCalibration {
    fn default() -> Self {
        Self::new(Vector3::zeros())
    }
}

impl TriaxialCorrection for OffsetCalibration {
    fn correct(&self, reading: Vector3<f64>, _temperature: f64) -> Vector3<f64> {
        reading + self.offset
    }

    fn write_record(&self, writer: &mut dyn Write) -> Result<(), CalibrationError> {
        for value in self.offset.iter() {
            writeln!(writer, "{value:?}")?;
        }
        Ok(())
    }

    fn read_record<R: BufRead>(reader: R) -> Result<Self, CalibrationError> {
        let mut reader = RecordReader::new(reader);
        let mut offset = Vector3::<f64>::zeros();
        for (axis, name) in ["x offset", "y offset", "z offset"].into_iter().enumerate() {
            let (line, text) = reader.next_line(name)?;
            let mut tokens = text.split_whitespace();
            offset[axis] = parse_field(tokens.next(), name, line)?;
            if tokens.next().is_some() {
                return Err(CalibrationError::malformed(
                    line,
                    format!("expected a single value for the {name}"),
                ));
            }
        }
        Ok(Self::new(offset))
    }
}
