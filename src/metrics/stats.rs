//! Latency summary statistics

use serde::Serialize;

/// Latency statistics in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyStats {
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    pub p99: f64,
    pub count: usize,
}

impl LatencyStats {
    /// Summarize every measurement; nothing is discarded as an outlier
    pub fn from_latencies(latencies: &[f64]) -> anyhow::Result<Self> {
        if latencies.is_empty() {
            anyhow::bail!("No latencies to summarize");
        }

        let mut sorted = latencies.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mean = mean(&sorted);
        let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / sorted.len() as f64;

        Ok(Self {
            mean,
            std: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
            count: sorted.len(),
        })
    }
}

/// Arithmetic mean; 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Percentile of ascending `sorted` by linear interpolation between ranks
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}
