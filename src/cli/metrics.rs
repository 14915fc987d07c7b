//! Metrics command - evaluate a saved result file offline

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::benchmark::BenchConfig;
use crate::error::BenchError;
use crate::metrics::{self, GroundTruth};

#[derive(Args)]
pub struct MetricsArgs {
    /// Benchmark config file (JSON)
    pub config: PathBuf,

    /// Result file to evaluate (default: the config's result_path)
    #[arg(short, long)]
    pub results: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

pub async fn run(args: MetricsArgs) -> anyhow::Result<()> {
    let config = BenchConfig::load(&args.config)?;

    let path = args
        .results
        .or_else(|| config.result_path.clone())
        .ok_or_else(|| BenchError::InvalidConfig("no result file given and result_path is not set".into()))?;

    let results = metrics::load_results(&path, config.mode)?;
    info!("Loaded {} results from {:?}", results.len(), path);

    let truth = config
        .ground_truth_path
        .as_deref()
        .map(|p| GroundTruth::load(p, config.top_k))
        .transpose()?;

    let summary = metrics::evaluate(&results, truth.as_ref(), config.top_k)?;
    info!("{}: {}", config.name, summary);
    super::print_summary(&config.name, &summary, &args.format)
}
