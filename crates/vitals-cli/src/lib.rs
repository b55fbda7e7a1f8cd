//! Vitals CLI
//!
//! Shared plumbing for the `vitals-convert` and `vitals-predict` binaries:
//! configuration loading with command-line overrides, tracing setup and the
//! two command flows.

pub mod commands;
pub mod config;
pub mod logging;

pub use commands::{convert_model, predict_sample};
pub use config::{ConversionConfig, FeatureConfig, Overrides, ToolConfig, DEFAULT_CONFIG_PATH};
pub use logging::init_tracing;
