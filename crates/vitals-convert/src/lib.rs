//! Vitals Convert
//!
//! Converts the trained health classifier into an ONNX artifact.
//!
//! The conversion runs in a fixed sequence:
//! - load the persisted model and unwrap the best estimator of the search
//! - check the declared input signature against the fitted features
//! - emit an ONNX graph (`CategoryMapper` / `Cast` / `Concat` /
//!   `TreeEnsembleClassifier`)
//! - write the encoded graph to disk

pub mod artifact;
pub mod converter;
pub mod estimator;
pub mod loader;
pub mod onnx;

pub use artifact::{
    decode_model, digest, encode_model, read_artifact, write_artifact, ArtifactInfo, DEFAULT_ARTIFACT_PATH,
};
pub use converter::{
    convert_file, convert_pipeline, ConvertOptions, ModelConverter, LABEL_OUTPUT,
    PROBABILITY_OUTPUT,
};
pub use estimator::{ClassifierModel, OrdinalEncoder, PersistedModel, Pipeline, SearchResult, Tree};
pub use loader::{load_best_estimator, load_model, DEFAULT_MODEL_PATH};
pub use onnx::ModelProto;
