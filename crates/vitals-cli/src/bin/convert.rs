//! Convert the trained health classifier to an ONNX artifact.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use vitals_cli::{convert_model, init_tracing, Overrides, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(name = "vitals-convert")]
#[command(about = "Convert the trained health classifier to ONNX", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Persisted trained model
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Output ONNX file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Opset of the default ONNX domain
    #[arg(long)]
    target_opset: Option<i64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let overrides = Overrides {
        model_path: cli.model,
        artifact_path: cli.output,
        target_opset: cli.target_opset,
    };

    convert_model(&cli.config, &overrides, &mut std::io::stdout().lock())
        .context("ONNX conversion failed")?;
    Ok(())
}
