//! Metrics module - persist results, score them against ground truth and
//! summarize latency

mod ground_truth;
mod results;
mod stats;

pub use ground_truth::GroundTruth;
pub use results::{load_results, save_results};
pub use stats::LatencyStats;

use std::fmt;

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::info;

use crate::benchmark::BenchConfig;
use crate::error::BenchError;
use crate::query::SearchResult;

/// Fraction of the top `k` that the backend actually returned
///
/// The denominator is always `k`, so short ground truth or short results
/// both lower the score.
pub fn precision(returned: impl IntoIterator<Item = u64>, expected: &[u64], k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let expected: FxHashSet<u64> = expected.iter().copied().collect();
    let returned: FxHashSet<u64> = returned.into_iter().collect();
    returned.intersection(&expected).count() as f64 / k as f64
}

/// Summary of a measured run
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub queries: usize,
    pub latency: LatencyStats,
    /// Mean precision over all queries, when ground truth was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let l = &self.latency;
        write!(
            f,
            "queries: {}, mean: {:.3}ms, std: {:.3}ms, min: {:.3}ms, max: {:.3}ms, p95: {:.3}ms, p99: {:.3}ms",
            self.queries, l.mean, l.std, l.min, l.max, l.p95, l.p99
        )?;
        if let Some(p) = self.precision {
            write!(f, ", precision: {:.4}", p)?;
        }
        Ok(())
    }
}

/// Summarize latencies and, with ground truth, mean precision at `k`
pub fn evaluate(
    results: &[SearchResult],
    ground_truth: Option<&GroundTruth>,
    k: usize,
) -> anyhow::Result<Summary> {
    let latencies: Vec<f64> = results.iter().map(|r| r.latency_ms).collect();
    let latency = LatencyStats::from_latencies(&latencies)?;

    let precision = match ground_truth {
        Some(truth) => {
            if truth.len() != results.len() {
                return Err(BenchError::GroundTruthMismatch {
                    expected: truth.len(),
                    actual: results.len(),
                }
                .into());
            }
            let per_query: Vec<f64> = results
                .iter()
                .enumerate()
                .map(|(i, result)| precision(result.row_ids(), truth.get(i).unwrap_or(&[]), k))
                .collect();
            Some(stats::mean(&per_query))
        }
        None => None,
    };

    Ok(Summary {
        queries: results.len(),
        latency,
        precision,
    })
}

/// Persist results if configured, then evaluate against configured ground truth
///
/// The result file is written before anything is scored, so it survives a
/// ground truth mismatch.
pub fn report(config: &BenchConfig, results: &[SearchResult]) -> anyhow::Result<Summary> {
    if let Some(path) = &config.result_path {
        save_results(path, results, config.mode)?;
        info!("Wrote {} results to {:?}", results.len(), path);
    }

    let truth = config
        .ground_truth_path
        .as_deref()
        .map(|path| GroundTruth::load(path, config.top_k))
        .transpose()?;

    let summary = evaluate(results, truth.as_ref(), config.top_k)?;
    info!("{}: {}", config.name, summary);
    Ok(summary)
}
