//! Config-driven conversion and prediction
//!
//! Drives the same sequence as the two binaries from a YAML file.

use std::path::PathBuf;
use tempfile::TempDir;
use vitals_cli::{Overrides, ToolConfig, DEFAULT_CONFIG_PATH};
use vitals_convert::convert_file;
use vitals_core::{Error, SampleBatch};
use vitals_runtime::{OnnxSession, Predictor};

fn fixture_model() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/my_health_classifier.joblib")
}

#[test]
fn test_convert_then_predict_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join(DEFAULT_CONFIG_PATH);
    std::fs::write(&config_path, "sample:\n  temperature_c: 38.5\n  birth_weight_kg: 2.0\n").unwrap();

    let overrides = Overrides {
        model_path: Some(fixture_model()),
        artifact_path: Some(temp_dir.path().join("classifier.onnx")),
        target_opset: None,
    };
    let config = ToolConfig::load(&config_path, &overrides).unwrap();

    let info = convert_file(
        &config.model_path,
        &config.artifact_path,
        &config.signature(),
        config.convert_options(),
    )
    .unwrap();
    assert!(info.bytes > 0);

    let session = OnnxSession::load(&config.artifact_path).unwrap();
    let batch = SampleBatch::from_row(&config.signature(), &config.sample_row()).unwrap();
    let prediction = session.predict(&batch).unwrap();

    assert_eq!(prediction.first_label(), Some(2));
    assert!(prediction.max_normalization_error().unwrap() < 1e-5);
}

#[test]
fn test_configured_feature_subset_fails_conversion() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join(DEFAULT_CONFIG_PATH);
    std::fs::write(
        &config_path,
        "features:\n  names: [gender, age_days, weight_kg]\n  categorical: [gender]\n",
    )
    .unwrap();

    let overrides = Overrides {
        model_path: Some(fixture_model()),
        artifact_path: Some(temp_dir.path().join("classifier.onnx")),
        target_opset: None,
    };
    let config = ToolConfig::load(&config_path, &overrides).unwrap();

    let err = convert_file(
        &config.model_path,
        &config.artifact_path,
        &config.signature(),
        config.convert_options(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Conversion(_)));
    assert!(!config.artifact_path.exists());
}

#[test]
fn test_numeric_gender_in_config_is_a_sample_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join(DEFAULT_CONFIG_PATH);
    std::fs::write(&config_path, "sample:\n  gender: 1\n").unwrap();

    let config = ToolConfig::load(&config_path, &Overrides::default()).unwrap();
    let result = SampleBatch::from_row(&config.signature(), &config.sample_row());
    assert!(matches!(result, Err(Error::Sample(_))));
}
