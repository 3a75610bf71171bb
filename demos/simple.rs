use nalgebra::Vector3;
use triaxial_calibration::{Calibrator, PolynomialCalibration, TriaxialCorrection};

const SAMPLES: usize = 1000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut calibrator = Calibrator::new();

    for n in 0..SAMPLES {
        // replace this with actual accelerometer readings (in g) taken in many orientations
        let a = n as f64 * 2.399_963;
        let z = 1.0 - 2.0 * (n as f64 + 0.5) / SAMPLES as f64;
        let r = (1.0 - z * z).sqrt();
        let reading = Vector3::new(1.03 * r * a.cos() + 0.02, 0.98 * r * a.sin(), z - 0.04);

        // weight 1, temperature ignored at order 0, expected magnitude 1 g
        calibrator.ingest(1.0, reading, 0.0, 1.0)?;
    }

    let calibration = calibrator.calibrate()?;
    let path = std::env::temp_dir().join("calibration.cal");
    calibration.save(&path)?;
    println!("Saved calibration to {}", path.display());

    let restored = PolynomialCalibration::load(&path)?;
    let corrected = restored.correct(Vector3::new(0.02, 0.0, 0.96), 0.0);
    println!(
        "Corrected: [{:.4}, {:.4}, {:.4}] |{:.4}|",
        corrected.x,
        corrected.y,
        corrected.z,
        corrected.norm()
    );

    Ok(())
}
