//! Backend trait for search databases under benchmark

use std::path::Path;

use async_trait::async_trait;

use crate::benchmark::{FieldSchema, IndexSpec};
use crate::dataset::Record;

/// One returned row
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub row_id: u64,
    pub score: Option<f32>,
}

/// What a search asks the backend to do
#[derive(Debug, Clone, Copy)]
pub enum SearchKind<'a> {
    /// k-nearest-neighbor search over a vector column
    Knn {
        field: &'a str,
        vector: &'a [f32],
        element_type: &'a str,
        metric: &'a str,
        k: usize,
    },
    /// Full-text match; `options` is `key=value;key=value`
    Match {
        field: &'a str,
        condition: &'a str,
        options: &'a str,
    },
}

/// A search with its projected output columns
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub output: &'a [&'a str],
    pub kind: SearchKind<'a>,
}

/// Operations the harness needs from a search database
///
/// Errors are returned as-is; the harness never retries.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Drop a table; a missing table is not an error
    async fn drop_table(&self, table: &str) -> anyhow::Result<()>;

    /// Create an empty table with the given columns
    async fn create_table(&self, table: &str, schema: &[FieldSchema]) -> anyhow::Result<()>;

    /// Whether `import` can load a delimited file natively
    fn supports_import(&self) -> bool {
        false
    }

    /// Bulk-load a delimited text file
    async fn import(&self, _table: &str, _path: &Path, _delimiter: char) -> anyhow::Result<()> {
        anyhow::bail!("{} backend does not support native import", self.name())
    }

    /// Insert one batch of rows
    async fn insert(&self, table: &str, batch: Vec<Record>) -> anyhow::Result<()>;

    /// Build a named index
    async fn create_index(
        &self,
        table: &str,
        index_name: &str,
        spec: &IndexSpec,
    ) -> anyhow::Result<()>;

    /// Run one query and return the hits in rank order
    async fn search(&self, table: &str, request: &SearchRequest<'_>) -> anyhow::Result<Vec<Hit>>;
}
