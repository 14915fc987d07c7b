//! Run command - upload, measured replay and metrics in one go

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tracing::info;

use crate::benchmark::BenchConfig;
use crate::config::Settings;
use crate::metrics;
use crate::query::{run_express, QueryParams, QuerySet, Replayer};
use crate::upload::BatchUploader;

#[derive(Args)]
pub struct RunArgs {
    /// Benchmark config file (JSON)
    pub config: PathBuf,

    /// Reuse the existing table instead of uploading
    #[arg(long)]
    pub skip_upload: bool,

    /// Also measure throughput after the measured replay
    #[arg(long)]
    pub express: bool,

    /// Concurrent query workers for --express (default from settings)
    #[arg(short, long, requires = "express")]
    pub concurrency: Option<usize>,

    /// Express run length in seconds (default from settings)
    #[arg(short, long, requires = "express")]
    pub duration: Option<u64>,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

pub async fn run(args: RunArgs, settings: &Settings) -> anyhow::Result<()> {
    let config = BenchConfig::load(&args.config)?;
    let backend = if args.skip_upload {
        super::connect_existing(settings, "run --skip-upload")?
    } else {
        super::connect(settings)?
    };

    info!("Benchmark '{}' on {} backend", config.name, backend.name());

    if args.skip_upload {
        info!("Skipping upload, reusing table '{}'", config.name);
    } else {
        BatchUploader::new(backend.clone(), &config).upload().await?;
    }

    if config.query_path.is_none() {
        info!("No query_path configured, nothing to replay");
        return Ok(());
    }

    let queries = Arc::new(QuerySet::load(&config)?);
    let replayer = Replayer::new(backend, config.name.clone(), QueryParams::from_config(&config));

    let results = replayer.measured(&queries).await?;
    let summary = metrics::report(&config, &results)?;
    super::print_summary(&config.name, &summary, &args.format)?;

    if args.express {
        let concurrency = args.concurrency.unwrap_or(settings.express.concurrency);
        let duration =
            Duration::from_secs(args.duration.unwrap_or(settings.express.duration_secs));
        let report = run_express(replayer, queries, concurrency, duration).await?;
        super::print_express(&config.name, &report, &args.format)?;
    }

    Ok(())
}
