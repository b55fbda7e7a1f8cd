//! Vitals Core
//!
//! Types shared by the vitals conversion and inference tools.
//!
//! This crate provides:
//! - The feature schema of the health classifier and its typed input signature
//! - Sample rows and the per-feature input columns built from them
//! - Error types and result handling

pub mod error;
pub mod sample;
pub mod schema;

pub use error::{Error, Result};
pub use sample::{reference_sample, ColumnData, FeatureValue, InputColumn, SampleBatch, SampleRow};
pub use schema::{
    Dim, FeatureKind, InputSignature, InputSpec, TensorShape, CATEGORICAL_FEATURE, FEATURE_NAMES,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::sample::{reference_sample, SampleBatch, SampleRow};
    pub use crate::schema::{FeatureKind, InputSignature};
}
