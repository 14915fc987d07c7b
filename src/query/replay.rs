//! Query replay in measured (sequential, recorded) and express (random,
//! throughput only) modes

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::{QueryParams, QuerySet, SearchResult};
use crate::backend::Backend;

/// Replays queries against one table
#[derive(Clone)]
pub struct Replayer {
    backend: Arc<dyn Backend>,
    table: String,
    params: Arc<QueryParams>,
}

impl Replayer {
    pub fn new(backend: Arc<dyn Backend>, table: impl Into<String>, params: QueryParams) -> Self {
        Self {
            backend,
            table: table.into(),
            params: Arc::new(params),
        }
    }

    /// Run every query once in file order, timing each backend call
    ///
    /// The first backend error aborts the run.
    pub async fn measured(&self, queries: &QuerySet) -> anyhow::Result<Vec<SearchResult>> {
        let progress = ProgressBar::new(queries.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} queries ({eta})")?
                .progress_chars("#>-"),
        );

        let mut results = Vec::with_capacity(queries.len());
        for query in queries.iter() {
            let request = self.params.request(query);

            let start = Instant::now();
            let hits = self.backend.search(&self.table, &request).await?;
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

            results.push(SearchResult { hits, latency_ms });
            progress.inc(1);
        }

        progress.finish_and_clear();
        info!(
            "Replayed {} queries from {:?}",
            results.len(),
            queries.path()
        );
        Ok(results)
    }

    /// Issue uniformly random queries until `stop` is set
    ///
    /// Each completed query bumps `counter`; nothing else is kept. Returns the
    /// number of queries this worker issued.
    pub async fn express(
        &self,
        queries: &QuerySet,
        counter: &AtomicU64,
        stop: &AtomicBool,
    ) -> anyhow::Result<u64> {
        let mut rng = StdRng::from_entropy();
        let mut issued = 0u64;

        while !stop.load(Ordering::Relaxed) {
            let i = rng.gen_range(0..queries.len());
            if let Some(query) = queries.get(i) {
                self.backend
                    .search(&self.table, &self.params.request(query))
                    .await?;
            }
            counter.fetch_add(1, Ordering::Relaxed);
            issued += 1;

            // Backends that never park would otherwise starve the timer task
            tokio::task::consume_budget().await;
        }

        debug!("Express worker stopped after {} queries", issued);
        Ok(issued)
    }
}

/// Outcome of an express run
#[derive(Debug, Clone)]
pub struct ExpressReport {
    pub queries: u64,
    pub concurrency: usize,
    pub elapsed: Duration,
    pub qps: f64,
}

/// Run `concurrency` express workers for `duration`
///
/// Stops early if any worker finishes on its own (which only happens on
/// error); that error is returned.
pub async fn run_express(
    replayer: Replayer,
    queries: Arc<QuerySet>,
    concurrency: usize,
    duration: Duration,
) -> anyhow::Result<ExpressReport> {
    let concurrency = concurrency.max(1);
    let counter = Arc::new(AtomicU64::new(0));
    let stop = Arc::new(AtomicBool::new(false));

    info!(
        "Express mode: {} workers for {:.1?} on '{}'",
        concurrency, duration, replayer.table
    );

    let start = Instant::now();
    let handles: Vec<_> = (0..concurrency)
        .map(|_| {
            let replayer = replayer.clone();
            let queries = queries.clone();
            let counter = counter.clone();
            let stop = stop.clone();
            tokio::spawn(async move { replayer.express(&queries, &counter, &stop).await })
        })
        .collect();

    let progress = ProgressBar::new_spinner();
    progress.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);

    let deadline = start + duration;
    let tick = Duration::from_millis(500);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || handles.iter().any(|h| h.is_finished()) {
            break;
        }
        tokio::time::sleep(tick.min(remaining)).await;

        let done = counter.load(Ordering::Relaxed);
        let secs = start.elapsed().as_secs_f64();
        progress.set_message(format!("{} queries, {:.1} qps", done, done as f64 / secs));
    }
    stop.store(true, Ordering::Relaxed);

    for result in futures::future::join_all(handles).await {
        result??;
    }

    let elapsed = start.elapsed();
    let total = counter.load(Ordering::Relaxed);
    progress.finish_and_clear();

    let qps = total as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    info!("Express mode: {} queries in {:.2?} ({:.1} qps)", total, elapsed, qps);

    Ok(ExpressReport {
        queries: total,
        concurrency,
        elapsed,
        qps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::RecordingBackend;
    use crate::backend::{Hit, MemoryBackend};
    use crate::benchmark::FieldSchema;
    use crate::query::Query;
    use std::path::Path;

    fn params(top_k: usize) -> QueryParams {
        let json = format!(
            r#"{{ "name": "t", "vector_name": "vec", "topK": {}, "metric_type": "l2" }}"#,
            top_k
        );
        QueryParams::from_config(&crate::benchmark::BenchConfig::parse(&json, Path::new(".")).unwrap())
    }

    fn vector_queries(n: usize) -> QuerySet {
        let queries = (0..n).map(|i| Query::Vector(vec![i as f32, 0.0])).collect();
        QuerySet::from_queries(queries, Path::new("queries.hdf5")).unwrap()
    }

    #[tokio::test]
    async fn test_measured_preserves_order() {
        let backend = Arc::new(MemoryBackend::new());
        let schema = vec![FieldSchema { name: "vec".into(), data_type: "vector,2,float".into() }];
        backend.create_table("t", &schema).await.unwrap();
        let rows = (0..20)
            .map(|i| {
                serde_json::json!({ "vec": [i as f32, 0.0] })
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        backend.insert("t", rows).await.unwrap();

        let replayer = Replayer::new(backend, "t", params(3));
        let results = replayer.measured(&vector_queries(5)).await.unwrap();

        assert_eq!(results.len(), 5);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.hits[0].row_id, i as u64);
            assert_eq!(result.hits.len(), 3);
            assert!(result.latency_ms >= 0.0);
        }
    }

    #[tokio::test]
    async fn test_measured_propagates_backend_errors() {
        let replayer = Replayer::new(Arc::new(RecordingBackend::failing()), "t", params(3));
        assert!(replayer.measured(&vector_queries(2)).await.is_err());
    }

    #[tokio::test]
    async fn test_express_stops_within_one_iteration() {
        let stop = Arc::new(AtomicBool::new(false));
        let backend = Arc::new(RecordingBackend::stopping_after(
            3,
            stop.clone(),
            vec![Hit { row_id: 1, score: None }],
        ));
        let replayer = Replayer::new(backend.clone(), "t", params(1));
        let counter = AtomicU64::new(0);

        let issued = replayer
            .express(&vector_queries(4), &counter, &stop)
            .await
            .unwrap();

        assert_eq!(issued, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(backend.searches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_express_does_nothing_once_stopped() {
        let backend = Arc::new(RecordingBackend::default());
        let replayer = Replayer::new(backend.clone(), "t", params(1));
        let counter = AtomicU64::new(0);
        let stop = AtomicBool::new(true);

        replayer
            .express(&vector_queries(1), &counter, &stop)
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_express_counts_all_workers() {
        let backend = Arc::new(RecordingBackend::default());
        let replayer = Replayer::new(backend.clone(), "t", params(1));

        let report = run_express(
            replayer,
            Arc::new(vector_queries(3)),
            4,
            Duration::from_millis(100),
        )
        .await
        .unwrap();

        assert_eq!(report.concurrency, 4);
        assert!(report.queries > 0);
        assert_eq!(report.queries, backend.searches.load(Ordering::SeqCst) as u64);
        assert!(report.qps > 0.0);
    }

    #[tokio::test]
    async fn test_run_express_surfaces_worker_errors() {
        let replayer = Replayer::new(Arc::new(RecordingBackend::failing()), "t", params(1));
        let result = run_express(replayer, Arc::new(vector_queries(1)), 2, Duration::from_secs(5)).await;
        assert!(result.is_err());
    }
}
