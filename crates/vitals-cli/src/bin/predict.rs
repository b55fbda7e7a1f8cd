//! Run the reference sample through a converted ONNX artifact.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use vitals_cli::{init_tracing, predict_sample, Overrides, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(name = "vitals-predict")]
#[command(about = "Run one sample prediction against the ONNX artifact", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// ONNX artifact to load
    #[arg(short, long)]
    artifact: Option<PathBuf>,

    /// Persisted trained model, used by --verify
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Also run the source estimator and compare the results
    #[arg(long)]
    verify: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let overrides = Overrides {
        model_path: cli.model,
        artifact_path: cli.artifact,
        target_opset: None,
    };

    predict_sample(&cli.config, &overrides, cli.verify, &mut std::io::stdout().lock())?;
    Ok(())
}
