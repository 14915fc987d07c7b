//! CLI module - command definitions and handlers

mod config_cmd;
mod express;
mod metrics;
mod query;
mod run;
mod upload;

use std::sync::Arc;

use clap::{Parser, Subcommand};

pub use config_cmd::ConfigArgs;
pub use express::ExpressArgs;
pub use metrics::MetricsArgs;
pub use query::QueryArgs;
pub use run::RunArgs;
pub use upload::UploadArgs;

use crate::backend::{Backend, BackendKind};
use crate::config::Settings;
use crate::error::BenchError;
use crate::metrics::Summary;
use crate::query::ExpressReport;

/// searchbench - benchmark harness for vector and full-text search engines
#[derive(Parser)]
#[command(name = "searchbench")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Backend to benchmark (memory, infinity); overrides the settings file
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Backend base URL; overrides the settings file
    #[arg(long, global = true, env = "SEARCHBENCH_ADDRESS")]
    pub address: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload the dataset, replay queries and report metrics
    Run(RunArgs),

    /// Recreate the table, insert the dataset and build indexes
    Upload(UploadArgs),

    /// Replay queries once each and report latency and precision
    Query(QueryArgs),

    /// Measure throughput with concurrent random queries
    Express(ExpressArgs),

    /// Evaluate a saved result file
    Metrics(MetricsArgs),

    /// Manage client settings
    Config(ConfigArgs),
}

impl Cli {
    /// Default tracing filter for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "searchbench=debug,info"
        } else if self.quiet {
            "searchbench=warn,warn"
        } else {
            "searchbench=info,warn"
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let mut settings = Settings::load();
        if let Some(kind) = self.backend {
            settings.backend.kind = kind;
        }
        if let Some(address) = self.address {
            settings.backend.address = address;
        }

        match self.command {
            Commands::Run(args) => run::run(args, &settings).await,
            Commands::Upload(args) => upload::run(args, &settings).await,
            Commands::Query(args) => query::run(args, &settings).await,
            Commands::Express(args) => express::run(args, &settings).await,
            Commands::Metrics(args) => metrics::run(args).await,
            Commands::Config(args) => config_cmd::run(args, &settings).await,
        }
    }
}

/// Connect to the backend named in the settings
fn connect(settings: &Settings) -> anyhow::Result<Arc<dyn Backend>> {
    settings
        .backend
        .kind
        .parse::<BackendKind>()?
        .connect(&settings.backend)
}

/// Connect to a backend that must already hold the benchmark table
fn connect_existing(settings: &Settings, command: &'static str) -> anyhow::Result<Arc<dyn Backend>> {
    let kind = settings.backend.kind.parse::<BackendKind>()?;
    if kind.is_in_process() {
        return Err(BenchError::InProcessBackend(command).into());
    }
    kind.connect(&settings.backend)
}

fn print_summary(name: &str, summary: &Summary, format: &str) -> anyhow::Result<()> {
    if format == "json" {
        let output = serde_json::json!({ "name": name, "summary": summary });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let l = &summary.latency;
    println!("\nResults for '{}' ({} queries):\n", name, summary.queries);
    println!("  mean   {:>10.3} ms", l.mean);
    println!("  std    {:>10.3} ms", l.std);
    println!("  min    {:>10.3} ms", l.min);
    println!("  max    {:>10.3} ms", l.max);
    println!("  p95    {:>10.3} ms", l.p95);
    println!("  p99    {:>10.3} ms", l.p99);
    if let Some(precision) = summary.precision {
        println!("  precision {:>7.4}", precision);
    }
    println!();
    Ok(())
}

fn print_express(name: &str, report: &ExpressReport, format: &str) -> anyhow::Result<()> {
    if format == "json" {
        let output = serde_json::json!({
            "name": name,
            "express": {
                "queries": report.queries,
                "concurrency": report.concurrency,
                "elapsed_secs": report.elapsed.as_secs_f64(),
                "qps": report.qps,
            }
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "\nExpress '{}': {} queries with {} workers in {:.2?} ({:.1} qps)\n",
            name, report.queries, report.concurrency, report.elapsed, report.qps
        );
    }
    Ok(())
}
