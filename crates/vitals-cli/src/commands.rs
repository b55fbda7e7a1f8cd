//! The convert and predict flows behind the two binaries
//!
//! Both write their report to any `Write` so the binaries can pass stdout.

use crate::config::{Overrides, ToolConfig};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};
use vitals_convert::{convert_file, load_best_estimator, ArtifactInfo};
use vitals_core::{Result, SampleBatch};
use vitals_runtime::{verify, NativePredictor, OnnxSession, Predictor, DEFAULT_TOLERANCE};

/// Load the configuration, convert the trained model and report the artifact.
///
/// Errors are returned to the caller.
pub fn convert_model<W: Write>(
    config_path: &Path,
    overrides: &Overrides,
    out: &mut W,
) -> Result<ArtifactInfo> {
    let config = ToolConfig::load(config_path, overrides)?;

    let signature = config.signature();
    for input in signature.inputs() {
        debug!(name = %input.name, kind = input.kind.element_type(), shape = %input.shape, "Declared input");
    }
    info!(model = %config.model_path.display(), "Converting model");

    let artifact = convert_file(
        &config.model_path,
        &config.artifact_path,
        &signature,
        config.convert_options(),
    )?;

    writeln!(
        out,
        "ONNX model successfully converted and saved as: {}",
        artifact.path.display()
    )?;
    Ok(artifact)
}

/// Run the configured sample through the ONNX artifact and report the result.
///
/// Any failure, including a bad configuration file, is written to `out` as a
/// diagnostic; only a failure to write the report itself is returned.
pub fn predict_sample<W: Write>(
    config_path: &Path,
    overrides: &Overrides,
    check_native: bool,
    out: &mut W,
) -> io::Result<()> {
    if let Err(e) = run_prediction(config_path, overrides, check_native, out) {
        writeln!(out)?;
        writeln!(out, "✗ An error occurred during ONNX inference: {}", e)?;
        writeln!(out, "Please verify your ONNX file or the input preparation step.")?;
    }
    Ok(())
}

fn run_prediction<W: Write>(
    config_path: &Path,
    overrides: &Overrides,
    check_native: bool,
    out: &mut W,
) -> Result<()> {
    let config = ToolConfig::load(config_path, overrides)?;
    let row = config.sample_row();
    let batch = SampleBatch::from_row(&config.signature(), &row)?;

    let session = OnnxSession::load(&config.artifact_path)?;

    writeln!(out, "--- Running Prediction on {} ---", config.artifact_path.display())?;
    writeln!(out, "Output names: {}", session.output_names().join(", "))?;
    writeln!(out, "Sample Input: {}", row)?;

    let prediction = session.predict(&batch)?;

    writeln!(out)?;
    writeln!(out, "✓ Prediction Successful!")?;
    match prediction.first_label() {
        Some(label) => writeln!(out, "Predicted Label (Class): {}", label)?,
        None => writeln!(out, "Predicted Label (Class): <none>")?,
    }
    if let Some(probabilities) = prediction.first_probabilities() {
        writeln!(out, "Output Probabilities: {:?}", probabilities)?;
    }

    if check_native {
        let native = NativePredictor::new(load_best_estimator(&config.model_path)?);
        let report = verify(&native, &session, &batch, DEFAULT_TOLERANCE)?;

        writeln!(out)?;
        writeln!(out, "Native estimator comparison:")?;
        writeln!(out, "  labels match: {}", report.labels_match)?;
        if !report.shapes_match {
            writeln!(out, "  probability shapes differ")?;
        }
        if let Some(delta) = report.max_probability_delta {
            writeln!(
                out,
                "  max probability delta: {:e} (tolerance {:e})",
                delta, report.tolerance
            )?;
        }
        let verdict = if report.passed() {
            "✓ ONNX output agrees"
        } else {
            "✗ ONNX output differs"
        };
        writeln!(out, "  {}", verdict)?;
    }
    Ok(())
}
