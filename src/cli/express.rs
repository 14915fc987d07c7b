//! Express command - throughput under concurrent random queries

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use crate::benchmark::BenchConfig;
use crate::config::Settings;
use crate::query::{run_express, QueryParams, QuerySet, Replayer};

#[derive(Args)]
pub struct ExpressArgs {
    /// Benchmark config file (JSON)
    pub config: PathBuf,

    /// Concurrent query workers (default from settings)
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Run length in seconds (default from settings)
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

pub async fn run(args: ExpressArgs, settings: &Settings) -> anyhow::Result<()> {
    let config = BenchConfig::load(&args.config)?;
    let backend = super::connect_existing(settings, "express")?;
    let queries = Arc::new(QuerySet::load(&config)?);

    let concurrency = args.concurrency.unwrap_or(settings.express.concurrency);
    let duration = Duration::from_secs(args.duration.unwrap_or(settings.express.duration_secs));

    let replayer = Replayer::new(backend, config.name.clone(), QueryParams::from_config(&config));
    let report = run_express(replayer, queries, concurrency, duration).await?;

    super::print_express(&config.name, &report, &args.format)
}
