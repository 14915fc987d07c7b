//! Recording backend for unit tests

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::traits::{Backend, Hit, SearchRequest};
use crate::benchmark::{FieldSchema, IndexSpec};
use crate::dataset::Record;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DropTable(String),
    CreateTable(String),
    Import,
    Insert(usize),
    CreateIndex(String),
}

/// Records every call; searches return `hits` and can raise a stop flag
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
    batches: Mutex<Vec<Vec<Record>>>,
    import: bool,
    hits: Vec<Hit>,
    fail_search: bool,
    pub searches: AtomicUsize,
    /// Set `stop` once this many searches have run
    stop_after: Option<(usize, Arc<AtomicBool>)>,
}

impl RecordingBackend {
    pub fn with_import() -> Self {
        Self {
            import: true,
            ..Default::default()
        }
    }

    /// Every search fails
    pub fn failing() -> Self {
        Self {
            fail_search: true,
            ..Default::default()
        }
    }

    /// Searches return `hits`; `stop` is raised on search number `limit`
    pub fn stopping_after(limit: usize, stop: Arc<AtomicBool>, hits: Vec<Hit>) -> Self {
        Self {
            hits,
            stop_after: Some((limit, stop)),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn inserted_batches(&self) -> Vec<Vec<Record>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn drop_table(&self, table: &str) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(Call::DropTable(table.into()));
        Ok(())
    }

    async fn create_table(&self, table: &str, _schema: &[FieldSchema]) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(Call::CreateTable(table.into()));
        Ok(())
    }

    fn supports_import(&self) -> bool {
        self.import
    }

    async fn import(&self, _table: &str, _path: &Path, _delimiter: char) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(Call::Import);
        Ok(())
    }

    async fn insert(&self, _table: &str, batch: Vec<Record>) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(Call::Insert(batch.len()));
        self.batches.lock().unwrap().push(batch);
        Ok(())
    }

    async fn create_index(
        &self,
        _table: &str,
        index_name: &str,
        _spec: &IndexSpec,
    ) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::CreateIndex(index_name.into()));
        Ok(())
    }

    async fn search(&self, _table: &str, _request: &SearchRequest<'_>) -> anyhow::Result<Vec<Hit>> {
        let n = self.searches.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, stop)) = &self.stop_after {
            if n >= *limit {
                stop.store(true, Ordering::SeqCst);
            }
        }
        if self.fail_search {
            anyhow::bail!("search failed");
        }
        Ok(self.hits.clone())
    }
}
