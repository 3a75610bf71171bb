//! Triaxial Calibration - temperature-dependent calibration for triaxial sensors
//!
//! Raw accelerometer and magnetometer readings suffer from axis misalignment,
//! scale error and temperature-dependent bias. This library fits a correction
//!
//! ```text
//! corrected = K(T) · raw + c(T)
//! ```
//!
//! where `K(T)` is a lower-triangular 3x3 matrix and `c(T)` an offset, both
//! polynomials of degree N in the temperature `T`. The fit only needs to
//! know what squared magnitude each corrected reading should have (local
//! gravity, local field strength), not the sensor orientation.
//!
//! # Features
//!
//! - Streaming ingestion: samples fold into fixed-size moment tensors, no
//!   sample storage
//! - Gauss-Newton fit with Cholesky-solved normal equations and best-iterate
//!   tracking
//! - O(N) runtime correction through the [`TriaxialCorrection`] trait
//! - Text records for saving and restoring fitted models
//! - Offset-only calibration sharing the same correction interface
//!
//! # Quick Start
//!
//! ```rust
//! use nalgebra::Vector3;
//! use triaxial_calibration::{Calibrator, TriaxialCorrection};
//!
//! let mut calibrator = Calibrator::new();
//!
//! // Accelerometer at rest in many orientations, gravity = 1 g
//! for i in 0..100 {
//!     let a = i as f64 * 0.7;
//!     let b = i as f64 * 0.3;
//!     let raw = Vector3::new(a.cos() * b.sin(), a.sin() * b.sin(), b.cos()) * 1.05
//!         + Vector3::new(0.02, -0.01, 0.03);
//!     calibrator.ingest(1.0, raw, 25.0, 1.0).unwrap();
//! }
//!
//! let calibration = calibrator.calibrate().unwrap();
//! let corrected = calibration.correct(Vector3::new(0.02, -0.01, 1.08), 25.0);
//! assert!((corrected.norm() - 1.0).abs() < 1e-6);
//! ```

pub mod calibration;
pub mod calibrator;
pub mod error;
mod math;
pub mod normal_equations;
pub mod offset;
mod record;
pub mod statistics;
mod types;

// Re-export all public types
pub use calibration::{PolynomialCalibration, TriaxialCorrection};
pub use calibrator::{Calibrator, FitSummary};
pub use error::CalibrationError;
pub use normal_equations::{NormalEquations, OperatorBlocks};
pub use offset::OffsetCalibration;
pub use statistics::SufficientStatistics;
pub use types::*;
