//! searchbench - benchmark harness for vector and full-text search engines
//!
//! Uploads a dataset, replays queries, and reports latency, throughput and
//! precision against ground truth.

mod backend;
mod benchmark;
mod cli;
mod config;
mod dataset;
mod error;
mod http;
mod metrics;
mod query;
mod upload;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose/--quiet
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    cli.run().await
}
