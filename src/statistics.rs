//! Streaming sufficient statistics for the calibration fit
//!
//! Raw samples are never stored. Each sample folds into two running weighted
//! averages whose entries are exactly the moments the fitting objective and
//! its derivatives need:
//!
//! - `Y2[n][i][j]`, `n = 0..=2N`: average of `y² · x̃ᵢ · x̃ⱼ · Tⁿ`
//! - `X4[n][i][j][k][l]`, `n = 0..=4N`: average of `x̃ᵢ · x̃ⱼ · x̃ₖ · x̃ₗ · Tⁿ`
//!
//! where `x̃` is the homogeneous reading. Both tensors live in flat,
//! contiguous buffers addressed by index arithmetic.

use log::debug;
use nalgebra::Vector3;

use crate::error::CalibrationError;
use crate::math::{homogeneous, temperature_powers};

/// Length of a homogeneous reading
const DIM: usize = 4;
const DIM2: usize = DIM * DIM;
const DIM4: usize = DIM2 * DIM2;

/// Running moment tensors of a weighted sample stream
///
/// Updates are a streaming weighted mean: after any sequence of samples the
/// tensors equal the weighted average over all of them, whatever the order
/// of ingestion (up to floating-point rounding). Intermediate states do
/// depend on order, so a single instance must be fed sequentially.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use triaxial_calibration::SufficientStatistics;
///
/// let mut stats = SufficientStatistics::new(0);
/// stats.ingest(1.0, Vector3::new(1.0, 0.0, 0.0), 20.0, 1.0).unwrap();
/// stats.ingest(3.0, Vector3::new(0.0, 1.0, 0.0), 20.0, 1.0).unwrap();
///
/// assert_eq!(stats.total_weight(), 4.0);
/// // weighted average of x₁⁴: (1·1 + 3·0) / 4
/// assert!((stats.x4(0, 0, 0, 0, 0) - 0.25).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct SufficientStatistics {
    /// Polynomial order N the tensors are sized for
    order: usize,
    /// Sum of ingested weights
    total_weight: f64,
    /// Number of samples with positive weight
    sample_count: usize,
    /// Temperature extremes over samples with positive weight
    temperature_range: Option<(f64, f64)>,
    /// `(2N+1) x 4 x 4`
    y2: Vec<f64>,
    /// `(4N+1) x 4 x 4 x 4 x 4`
    x4: Vec<f64>,
    /// Scratch buffer for `T^0..=T^(4N)`
    powers: Vec<f64>,
}

impl SufficientStatistics {
    /// Allocate zeroed tensors for a polynomial of the given order
    pub fn new(order: usize) -> Self {
        let y2_degrees = 2 * order + 1;
        let x4_degrees = 4 * order + 1;
        debug!(
            "allocating sufficient statistics for order {order}: {} + {} entries",
            y2_degrees * DIM2,
            x4_degrees * DIM4
        );
        Self {
            order,
            total_weight: 0.0,
            sample_count: 0,
            temperature_range: None,
            y2: vec![0.0; y2_degrees * DIM2],
            x4: vec![0.0; x4_degrees * DIM4],
            powers: vec![0.0; x4_degrees],
        }
    }

    /// Discard all ingested data, keeping the polynomial order
    pub fn reset(&mut self) {
        self.total_weight = 0.0;
        self.sample_count = 0;
        self.temperature_range = None;
        self.y2.fill(0.0);
        self.x4.fill(0.0);
    }

    /// Fold one weighted sample into the running averages
    ///
    /// # Arguments
    /// * `weight` - Sample weight, finite and non-negative
    /// * `reading` - Raw triaxial reading
    /// * `temperature` - Sensor temperature at the time of the reading
    /// * `target_squared` - Expected squared magnitude of the corrected reading
    ///
    /// A zero weight leaves every tensor and the total weight untouched.
    ///
    /// # Errors
    /// [`CalibrationError::InvalidSample`] for a negative, NaN or infinite weight.
    pub fn ingest(
        &mut self,
        weight: f64,
        reading: Vector3<f64>,
        temperature: f64,
        target_squared: f64,
    ) -> Result<(), CalibrationError> {
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(CalibrationError::InvalidSample { weight });
        }
        if weight == 0.0 {
            return Ok(());
        }

        let alpha = weight / (self.total_weight + weight);
        let keep = 1.0 - alpha;
        self.total_weight += weight;
        self.sample_count += 1;
        self.temperature_range = Some(match self.temperature_range {
            Some((low, high)) => (low.min(temperature), high.max(temperature)),
            None => (temperature, temperature),
        });

        temperature_powers(temperature, &mut self.powers);
        let x = homogeneous(&reading);

        for i in 0..DIM {
            for j in 0..DIM {
                let xij = x[i] * x[j];

                let yij = target_squared * xij;
                for (n, slab) in self.y2.chunks_exact_mut(DIM2).enumerate() {
                    let entry = &mut slab[i * DIM + j];
                    *entry = keep * *entry + alpha * yij * self.powers[n];
                }

                for k in 0..DIM {
                    let xijk = xij * x[k];
                    for l in 0..DIM {
                        let xijkl = xijk * x[l];
                        let offset = ((i * DIM + j) * DIM + k) * DIM + l;
                        for (n, slab) in self.x4.chunks_exact_mut(DIM4).enumerate() {
                            let entry = &mut slab[offset];
                            *entry = keep * *entry + alpha * xijkl * self.powers[n];
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Polynomial order the tensors are sized for
    pub fn order(&self) -> usize {
        self.order
    }

    /// Sum of all ingested weights
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Number of ingested samples with positive weight
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Lowest and highest temperature seen, if any sample carried weight
    pub fn temperature_range(&self) -> Option<(f64, f64)> {
        self.temperature_range
    }

    /// Number of temperature powers held by `Y2` (`2N+1`)
    pub fn y2_degrees(&self) -> usize {
        2 * self.order + 1
    }

    /// Number of temperature powers held by `X4` (`4N+1`)
    pub fn x4_degrees(&self) -> usize {
        4 * self.order + 1
    }

    /// Entry `Y2[n][i][j]`
    ///
    /// # Panics
    /// If `n >= 2N+1` or an index is outside `0..4`.
    #[inline]
    pub fn y2(&self, n: usize, i: usize, j: usize) -> f64 {
        self.y2[(n * DIM + i) * DIM + j]
    }

    /// Entry `X4[n][i][j][k][l]`
    ///
    /// # Panics
    /// If `n >= 4N+1` or an index is outside `0..4`.
    #[inline]
    pub fn x4(&self, n: usize, i: usize, j: usize, k: usize, l: usize) -> f64 {
        self.x4[(((n * DIM + i) * DIM + j) * DIM + k) * DIM + l]
    }
}
