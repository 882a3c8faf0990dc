use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use veriwave_detector::Detector;
use veriwave_domain::{FeatureConfig, ModelConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Classify an audio file as real or fake", long_about = None)]
struct Cli {
    /// Path to the audio file to classify (.wav, .mp3, .flac)
    input: PathBuf,
    /// Path to the ONNX classifier artifact
    #[arg(long)]
    model: Option<PathBuf>,
    /// Path to the label mapping JSON
    #[arg(long)]
    labels: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut model_config = ModelConfig::from_env();
    if let Some(model) = cli.model {
        model_config.model_path = model;
    }
    if let Some(labels) = cli.labels {
        model_config.label_map_path = labels;
    }

    let detector = Detector::new(FeatureConfig::default(), model_config);
    let verdict = detector.predict(&cli.input)?;
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}
