//! Writing and reading the serialized ONNX artifact

use crate::onnx::ModelProto;
use prost::Message;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::info;
use vitals_core::{Error, Result};

/// Default artifact filename
pub const DEFAULT_ARTIFACT_PATH: &str = "health_classifier.onnx";

/// What was written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub bytes: usize,
    /// Lowercase hex SHA-256 of the file contents
    pub sha256: String,
}

/// Serialize a model to protobuf bytes
pub fn encode_model(model: &ModelProto) -> Vec<u8> {
    model.encode_to_vec()
}

/// Hex SHA-256 of a byte slice
pub fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Serialize `model` and write it to `path`, replacing any existing file
pub fn write_artifact(model: &ModelProto, path: impl AsRef<Path>) -> Result<ArtifactInfo> {
    let path = path.as_ref();
    let bytes = encode_model(model);
    if bytes.is_empty() {
        return Err(Error::artifact("model serialized to zero bytes"));
    }

    std::fs::write(path, &bytes).map_err(|e| {
        Error::artifact(format!("failed to write {}: {}", path.display(), e))
    })?;

    let info = ArtifactInfo {
        path: path.to_path_buf(),
        bytes: bytes.len(),
        sha256: digest(&bytes),
    };
    info!(path = %path.display(), bytes = info.bytes, sha256 = %info.sha256, "Wrote ONNX artifact");
    Ok(info)
}

/// Read an artifact back into its message form
pub fn read_artifact(path: impl AsRef<Path>) -> Result<ModelProto> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| Error::artifact(format!("failed to read {}: {}", path.display(), e)))?;
    if bytes.is_empty() {
        return Err(Error::artifact(format!("{} is empty", path.display())));
    }

    decode_model(&bytes)
        .map_err(|e| Error::artifact(format!("{}: {}", path.display(), e)))
}

/// Parse protobuf bytes into a model
pub fn decode_model(bytes: &[u8]) -> Result<ModelProto> {
    ModelProto::decode(bytes)
        .map_err(|e| Error::artifact(format!("not a valid ONNX model: {}", e)))
}
