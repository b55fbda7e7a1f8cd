//! Error types for the vitals tools

/// Result type alias using the vitals Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type shared by the conversion and inference crates
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Sample construction errors (missing feature, wrong value type)
    #[error("sample error: {0}")]
    Sample(String),

    /// Persisted model errors (unexpected object, missing best estimator)
    #[error("model error: {0}")]
    Model(String),

    /// Estimator to ONNX conversion errors
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Artifact read/write errors
    #[error("artifact error: {0}")]
    Artifact(String),

    /// Inference runtime errors
    #[error("inference error: {0}")]
    Inference(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a new sample error
    pub fn sample(msg: impl Into<String>) -> Self {
        Self::Sample(msg.into())
    }

    /// Create a new model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new conversion error
    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::Conversion(msg.into())
    }

    /// Create a new artifact error
    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::Artifact(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
