//! Conversion Integration Tests
//!
//! Runs the full load → convert → write sequence against the fixture model
//! shipped in `fixtures/`.

use std::path::PathBuf;
use tempfile::TempDir;
use vitals_convert::{
    convert_file, load_model, read_artifact, ClassifierModel, ConvertOptions, PersistedModel,
    DEFAULT_ARTIFACT_PATH,
};
use vitals_core::{Error, InputSignature, FEATURE_NAMES};

fn fixture_model() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/my_health_classifier.joblib")
}

#[test]
fn test_fixture_is_a_search_wrapper() {
    let model = load_model(fixture_model()).unwrap();
    assert_eq!(model.kind(), "randomized_search_cv");

    let pipeline = model.into_best_estimator().unwrap();
    assert_eq!(pipeline.feature_names_in, FEATURE_NAMES.to_vec());
    match &pipeline.classifier {
        ClassifierModel::RandomForest(forest) => assert_eq!(forest.trees.len(), 2),
        other => panic!("Expected random forest, got {}", other.name()),
    }
}

#[test]
fn test_conversion_writes_non_empty_artifact() {
    let temp_dir = TempDir::new().unwrap();
    let artifact = temp_dir.path().join(DEFAULT_ARTIFACT_PATH);

    let info = convert_file(
        fixture_model(),
        &artifact,
        &InputSignature::health_classifier(),
        ConvertOptions::default(),
    )
    .unwrap();

    assert!(info.bytes > 0);
    assert!(artifact.exists());

    let model = read_artifact(&artifact).unwrap();
    let graph = model.graph.unwrap();
    assert_eq!(graph.input.len(), 9);
    assert_eq!(graph.output.len(), 2);
}

#[test]
fn test_conversion_is_byte_reproducible() {
    let temp_dir = TempDir::new().unwrap();
    let first = temp_dir.path().join("first.onnx");
    let second = temp_dir.path().join("second.onnx");
    let signature = InputSignature::health_classifier();

    let a = convert_file(fixture_model(), &first, &signature, ConvertOptions::default()).unwrap();
    let b = convert_file(fixture_model(), &second, &signature, ConvertOptions::default()).unwrap();

    assert_eq!(a.sha256, b.sha256);
    assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
}

#[test]
fn test_search_without_best_estimator_fails() {
    let temp_dir = TempDir::new().unwrap();
    let model_path = temp_dir.path().join("no_refit.joblib");
    std::fs::write(
        &model_path,
        r#"{"type": "grid_search_cv", "best_score": 0.8, "n_candidates": 4}"#,
    )
    .unwrap();

    let err = convert_file(
        &model_path,
        temp_dir.path().join("out.onnx"),
        &InputSignature::health_classifier(),
        ConvertOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err, Error::Model(_)));
    assert!(!temp_dir.path().join("out.onnx").exists());
}

#[test]
fn test_unsupported_estimator_fails() {
    let mut model = load_model(fixture_model()).unwrap();
    if let PersistedModel::RandomizedSearchCv(search) = &mut model {
        if let Some(pipeline) = search.best_estimator.as_mut() {
            pipeline.classifier = ClassifierModel::Unsupported;
        }
    }

    let temp_dir = TempDir::new().unwrap();
    let model_path = temp_dir.path().join("svc.joblib");
    std::fs::write(&model_path, serde_json::to_string(&model).unwrap()).unwrap();

    let err = convert_file(
        &model_path,
        temp_dir.path().join("out.onnx"),
        &InputSignature::health_classifier(),
        ConvertOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Conversion(_)));
}

#[test]
fn test_missing_model_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let result = convert_file(
        temp_dir.path().join("missing.joblib"),
        temp_dir.path().join("out.onnx"),
        &InputSignature::health_classifier(),
        ConvertOptions::default(),
    );
    assert!(result.is_err());
}
