//! Tool configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use vitals_convert::{ConvertOptions, DEFAULT_ARTIFACT_PATH, DEFAULT_MODEL_PATH};
use vitals_core::{
    reference_sample, Error, FeatureValue, InputSignature, Result, SampleRow, CATEGORICAL_FEATURE,
    FEATURE_NAMES,
};

/// Default configuration file, read from the working directory
pub const DEFAULT_CONFIG_PATH: &str = "vitals.yaml";

/// Settings shared by `vitals-convert` and `vitals-predict`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Persisted trained model
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// ONNX artifact written by the converter and read by the predictor
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    /// Feature declarations
    #[serde(default)]
    pub features: FeatureConfig,

    /// Converter settings
    #[serde(default)]
    pub conversion: ConversionConfig,

    /// Values replacing those of the reference sample
    #[serde(default)]
    pub sample: BTreeMap<String, FeatureValue>,
}

/// Ordered feature names and which of them are categorical
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default = "default_feature_names")]
    pub names: Vec<String>,

    #[serde(default = "default_categorical")]
    pub categorical: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    #[serde(default = "default_target_opset")]
    pub target_opset: i64,

    #[serde(default = "default_graph_name")]
    pub graph_name: String,
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model_path: Option<PathBuf>,
    pub artifact_path: Option<PathBuf>,
    pub target_opset: Option<i64>,
}

impl ToolConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: impl AsRef<Path>, overrides: &Overrides) -> Result<Self> {
        let config_path = config_path.as_ref();
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Self = serde_yaml::from_str(&content)?;
            debug!(path = %config_path.display(), "Loaded configuration file");
            config
        } else {
            Self::default()
        };

        if let Some(model_path) = &overrides.model_path {
            config.model_path = model_path.clone();
        }
        if let Some(artifact_path) = &overrides.artifact_path {
            config.artifact_path = artifact_path.clone();
        }
        if let Some(opset) = overrides.target_opset {
            config.conversion.target_opset = opset;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject feature declarations that cannot describe any model
    pub fn validate(&self) -> Result<()> {
        if self.features.names.is_empty() {
            return Err(Error::config("features.names must not be empty"));
        }
        if let Some(unknown) = self
            .features
            .categorical
            .iter()
            .find(|c| !self.features.names.contains(*c))
        {
            return Err(Error::config(format!(
                "categorical feature '{}' is not listed in features.names",
                unknown
            )));
        }
        Ok(())
    }

    pub fn signature(&self) -> InputSignature {
        InputSignature::map_features(&self.features.names, &self.features.categorical)
    }

    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions::default()
            .with_target_opset(self.conversion.target_opset)
            .with_graph_name(self.conversion.graph_name.clone())
    }

    /// The reference sample with any configured values applied
    pub fn sample_row(&self) -> SampleRow {
        let mut row = reference_sample();
        for (name, value) in &self.sample {
            row.insert(name.clone(), value.clone());
        }
        row
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            artifact_path: default_artifact_path(),
            features: FeatureConfig::default(),
            conversion: ConversionConfig::default(),
            sample: BTreeMap::new(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            names: default_feature_names(),
            categorical: default_categorical(),
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            target_opset: default_target_opset(),
            graph_name: default_graph_name(),
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_PATH)
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACT_PATH)
}

fn default_feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

fn default_categorical() -> Vec<String> {
    vec![CATEGORICAL_FEATURE.to_string()]
}

fn default_target_opset() -> i64 {
    ConvertOptions::default().target_opset
}

fn default_graph_name() -> String {
    ConvertOptions::default().graph_name
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            ToolConfig::load(temp_dir.path().join(DEFAULT_CONFIG_PATH), &Overrides::default())
                .unwrap();

        assert_eq!(config.model_path, PathBuf::from("my_health_classifier.joblib"));
        assert_eq!(config.artifact_path, PathBuf::from("health_classifier.onnx"));
        assert_eq!(config.conversion.target_opset, 14);
        assert_eq!(config.signature(), InputSignature::health_classifier());
        assert_eq!(config.sample_row(), reference_sample());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_PATH);
        std::fs::write(
            &path,
            "artifact_path: out/model.onnx\nsample:\n  gender: Male\n  age_days: 30\n",
        )
        .unwrap();

        let config = ToolConfig::load(&path, &Overrides::default()).unwrap();
        assert_eq!(config.artifact_path, PathBuf::from("out/model.onnx"));
        assert_eq!(config.model_path, PathBuf::from(DEFAULT_MODEL_PATH));

        let row = config.sample_row();
        assert_eq!(row.len(), 9);
        assert_eq!(row.get("gender"), Some(&FeatureValue::from("Male")));
        assert_eq!(row.get("age_days"), Some(&FeatureValue::Number(30.0)));
        assert_eq!(row.iter().next().map(|(name, _)| name), Some("gender"));
    }

    #[test]
    fn test_cli_overrides_win() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_PATH);
        std::fs::write(&path, "model_path: from_file.joblib\nconversion:\n  target_opset: 12\n")
            .unwrap();

        let overrides = Overrides {
            model_path: Some(PathBuf::from("from_cli.joblib")),
            artifact_path: None,
            target_opset: Some(15),
        };
        let config = ToolConfig::load(&path, &overrides).unwrap();

        assert_eq!(config.model_path, PathBuf::from("from_cli.joblib"));
        assert_eq!(config.convert_options().target_opset, 15);
        assert_eq!(config.convert_options().graph_name, "health_classifier");
    }

    #[test]
    fn test_unknown_categorical_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_PATH);
        std::fs::write(&path, "features:\n  names: [a, b]\n  categorical: [c]\n").unwrap();

        let result = ToolConfig::load(&path, &Overrides::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_PATH);
        std::fs::write(&path, "features: [unclosed\n").unwrap();

        let result = ToolConfig::load(&path, &Overrides::default());
        assert!(matches!(result, Err(Error::Yaml(_))));
    }
}
