//! Upload command - load a dataset into the backend

use std::path::PathBuf;

use clap::Args;

use crate::benchmark::BenchConfig;
use crate::config::Settings;
use crate::upload::BatchUploader;

#[derive(Args)]
pub struct UploadArgs {
    /// Benchmark config file (JSON)
    pub config: PathBuf,
}

pub async fn run(args: UploadArgs, settings: &Settings) -> anyhow::Result<()> {
    let config = BenchConfig::load(&args.config)?;
    let backend = super::connect(settings)?;

    let stats = BatchUploader::new(backend, &config).upload().await?;

    if stats.imported {
        println!("Imported dataset into '{}' in {:.2?}", config.name, stats.elapsed);
    } else {
        println!(
            "Inserted {} rows into '{}' in {} batches ({} skipped) in {:.2?}",
            stats.rows, config.name, stats.batches, stats.skipped, stats.elapsed
        );
    }
    Ok(())
}
