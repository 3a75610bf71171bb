use std::fs;

use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use triaxial_calibration::{
    CalibrationError, Calibrator, CalibratorSettings, OffsetCalibration, PolynomialCalibration,
    TriaxialCorrection,
};

fn probes() -> Vec<(Vector3<f64>, f64)> {
    let mut rng = Pcg64::seed_from_u64(42);
    (0..50)
        .map(|_| {
            let reading = Vector3::new(
                rng.random_range(-20.0..20.0),
                rng.random_range(-20.0..20.0),
                rng.random_range(-20.0..20.0),
            );
            (reading, rng.random_range(-40.0..85.0))
        })
        .collect()
}

fn fitted_model() -> PolynomialCalibration {
    let mut calibrator = Calibrator::with_settings(CalibratorSettings {
        polynomial_order: 1,
        ..Default::default()
    })
    .unwrap();
    let mut rng = Pcg64::seed_from_u64(3);
    for _ in 0..400 {
        let temperature: f64 = rng.random_range(-1.0..1.0);
        let direction = loop {
            let v = Vector3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            );
            if v.norm() > 0.1 {
                break v.normalize();
            }
        };
        let scale = 1.0 + 0.05 * temperature;
        let raw = direction * scale + Vector3::new(0.02, -0.01, 0.03 * temperature);
        calibrator.ingest(1.0, raw, temperature, 1.0).unwrap();
    }
    calibrator.calibrate().unwrap()
}

#[test]
fn test_polynomial_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accelerometer.cal");

    let model = fitted_model();
    model.save(&path).unwrap();
    let restored = PolynomialCalibration::load(&path).unwrap();

    assert_eq!(restored.polynomial_order(), model.polynomial_order());
    assert_eq!(restored.temperature_range(), model.temperature_range());
    for (reading, temperature) in probes() {
        assert_eq!(
            restored.correct(reading, temperature),
            model.correct(reading, temperature)
        );
    }
}

#[test]
fn test_polynomial_file_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layout.cal");
    fitted_model().save(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);

    let header: Vec<&str> = lines[0].split_whitespace().collect();
    assert_eq!(header.len(), 3);
    assert_eq!(header[0], "1");
    for line in &lines[1..] {
        let values: Vec<f64> = line
            .split_whitespace()
            .map(|token| token.parse().unwrap())
            .collect();
        assert_eq!(values.len(), 9);
    }
}

#[test]
fn test_offset_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gyroscope.cal");

    let model = OffsetCalibration::new(Vector3::new(-0.731, 0.00042, 12.5));
    model.save(&path).unwrap();
    let restored = OffsetCalibration::load(&path).unwrap();

    assert_eq!(restored, model);
    for (reading, temperature) in probes() {
        assert_eq!(
            restored.correct(reading, temperature),
            model.correct(reading, temperature)
        );
    }
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);
}

#[test]
fn test_save_overwrites_existing_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sensor.cal");

    fitted_model().save(&path).unwrap();
    PolynomialCalibration::identity().save(&path).unwrap();

    assert_eq!(
        PolynomialCalibration::load(&path).unwrap(),
        PolynomialCalibration::identity()
    );
}

#[test]
fn test_legacy_record_with_stray_tokens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.cal");
    fs::write(
        &path,
        "1 -10.0 50.0\n 1.01 0.0 0.99 0.0 0.0 1.0 0.1 0.2 0.3 ;\n K 0.001 0 0.002 0 0 0.003 0 0 0\n",
    )
    .unwrap();

    let model = PolynomialCalibration::load(&path).unwrap();
    assert_eq!(model.polynomial_order(), 1);
    assert_eq!(model.temperature_range(), (-10.0, 50.0));
    assert_eq!(model.coefficients()[9], 0.001);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.cal");

    assert!(matches!(
        PolynomialCalibration::load(&path),
        Err(CalibrationError::Io(_))
    ));
    assert!(matches!(
        OffsetCalibration::load(&path),
        Err(CalibrationError::Io(_))
    ));
}

#[test]
fn test_unwritable_path_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing-directory").join("sensor.cal");

    assert!(matches!(
        PolynomialCalibration::identity().save(&path),
        Err(CalibrationError::Io(_))
    ));
}

#[test]
fn test_truncated_file_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.cal");
    fs::write(&path, "2 0 40\n1 0 1 0 0 1 0 0 0\n0 0 0 0 0 0 0 0 0\n").unwrap();

    match PolynomialCalibration::load(&path) {
        Err(CalibrationError::MalformedRecord { line, .. }) => assert_eq!(line, 4),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_corrupt_bytes_are_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.cal");
    fs::write(&path, b"0 0 0\n1 0 1 0 0 1 0 0 \xff\xfe\n").unwrap();

    match PolynomialCalibration::load(&path) {
        Err(CalibrationError::MalformedRecord { line, .. }) => assert_eq!(line, 2),
        other => panic!("unexpected result: {other:?}"),
    }

    fs::write(&path, b"0.5\n\x80\n2.0\n").unwrap();
    assert!(matches!(
        OffsetCalibration::load(&path),
        Err(CalibrationError::MalformedRecord { line: 2, .. })
    ));
}

#[test]
fn test_offset_record_is_not_a_polynomial_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offset.cal");
    OffsetCalibration::new(Vector3::new(1.0, 2.0, 3.0)).save(&path).unwrap();

    // "1.0" is not an integer order
    assert!(matches!(
        PolynomialCalibration::load(&path),
        Err(CalibrationError::MalformedRecord { line: 1, .. })
    ));
}
