//! Loading the persisted trained model

use crate::estimator::{PersistedModel, Pipeline};
use std::path::Path;
use tracing::info;
use vitals_core::{Error, Result};

/// Default location of the persisted trained model
pub const DEFAULT_MODEL_PATH: &str = "my_health_classifier.joblib";

/// Read and parse the persisted model document
pub fn load_model(path: impl AsRef<Path>) -> Result<PersistedModel> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::model(format!("failed to read trained model {}: {}", path.display(), e))
    })?;

    let model: PersistedModel = serde_json::from_str(&contents).map_err(|e| {
        Error::model(format!("failed to parse trained model {}: {}", path.display(), e))
    })?;

    info!(path = %path.display(), kind = model.kind(), "Loaded trained model");
    Ok(model)
}

/// Load the model file and unwrap the estimator to convert
pub fn load_best_estimator(path: impl AsRef<Path>) -> Result<Pipeline> {
    load_model(path)?.into_best_estimator()
}
