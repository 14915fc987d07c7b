//! Query command - measured replay against an already loaded table

use std::path::PathBuf;

use clap::Args;

use crate::benchmark::BenchConfig;
use crate::config::Settings;
use crate::metrics;
use crate::query::{QueryParams, QuerySet, Replayer};

#[derive(Args)]
pub struct QueryArgs {
    /// Benchmark config file (JSON)
    pub config: PathBuf,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

pub async fn run(args: QueryArgs, settings: &Settings) -> anyhow::Result<()> {
    let config = BenchConfig::load(&args.config)?;
    let backend = super::connect_existing(settings, "query")?;

    let queries = QuerySet::load(&config)?;
    let replayer = Replayer::new(backend, config.name.clone(), QueryParams::from_config(&config));
    let results = replayer.measured(&queries).await?;

    let summary = metrics::report(&config, &results)?;
    super::print_summary(&config.name, &summary, &args.format)
}
