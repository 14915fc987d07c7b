//! Benchmark configuration (one JSON file per benchmark)
//!
//! Example:
//! ```json
//! {
//!   "name": "sift_benchmark",
//!   "schema": { "embeddings": { "type": "vector,128,float" } },
//!   "data_path": "datasets/sift/sift-128-euclidean.hdf5",
//!   "data_link": "http://ann-benchmarks.com/sift-128-euclidean.hdf5",
//!   "insert_batch_size": 8192,
//!   "query_path": "datasets/sift/sift-128-euclidean.hdf5",
//!   "ground_truth_path": "datasets/sift/sift-128-euclidean.hdf5",
//!   "vector_name": "embeddings",
//!   "metric_type": "l2",
//!   "topK": 100,
//!   "mode": "vector",
//!   "index": {
//!     "embeddings": { "type": "HNSW", "params": { "M": 16, "ef_construction": 200, "metric": "l2" } }
//!   }
//! }
//! ```
//!
//! Relative paths are resolved against the directory holding the config file.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BenchError;

/// What kind of queries the benchmark replays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BenchMode {
    #[default]
    Vector,
    Fulltext,
}

/// A declared table column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    /// Backend type string, e.g. `varchar` or `vector,128,float`
    pub data_type: String,
}

/// Index kinds understood by the uploader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    FullText,
    Hnsw,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::FullText => write!(f, "FULLTEXT"),
            IndexKind::Hnsw => write!(f, "HNSW"),
        }
    }
}

/// One index to build after upload
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub field: String,
    pub kind: IndexKind,
    /// Kind-specific parameters, stringified
    pub params: Vec<(String, String)>,
}

impl IndexSpec {
    /// Look up a parameter by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// On-disk shape of the config file
#[derive(Debug, Deserialize)]
struct RawConfig {
    name: String,
    #[serde(default)]
    schema: Map<String, Value>,
    data_path: Option<PathBuf>,
    data_link: Option<String>,
    #[serde(default = "default_insert_batch_size")]
    insert_batch_size: usize,
    query_path: Option<PathBuf>,
    vector_name: Option<String>,
    #[serde(default = "default_metric_type")]
    metric_type: String,
    #[serde(rename = "topK", default = "default_top_k")]
    top_k: usize,
    #[serde(default)]
    mode: BenchMode,
    #[serde(default)]
    index: Map<String, Value>,
    #[serde(default)]
    use_import: bool,
    result_path: Option<PathBuf>,
    ground_truth_path: Option<PathBuf>,
    #[serde(default = "default_fulltext_field")]
    fulltext_field: String,
}

fn default_insert_batch_size() -> usize {
    1024
}

fn default_metric_type() -> String {
    "l2".to_string()
}

fn default_top_k() -> usize {
    10
}

fn default_fulltext_field() -> String {
    "body".to_string()
}

/// Validated, immutable benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub name: String,
    pub schema: Vec<FieldSchema>,
    pub data_path: Option<PathBuf>,
    pub data_link: Option<String>,
    pub insert_batch_size: usize,
    pub query_path: Option<PathBuf>,
    pub vector_name: Option<String>,
    pub metric_type: String,
    pub top_k: usize,
    pub mode: BenchMode,
    pub indexes: Vec<IndexSpec>,
    pub use_import: bool,
    pub result_path: Option<PathBuf>,
    pub ground_truth_path: Option<PathBuf>,
    pub fulltext_field: String,
}

impl BenchConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read benchmark config {:?}", path))?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let config = Self::parse(&content, &base_dir)
            .with_context(|| format!("Failed to parse benchmark config {:?}", path))?;
        tracing::debug!("Loaded benchmark config '{}' from {:?}", config.name, path);
        Ok(config)
    }

    /// Parse config text, resolving relative paths against `base_dir`
    pub fn parse(content: &str, base_dir: &Path) -> anyhow::Result<Self> {
        let raw: RawConfig = serde_json::from_str(content)?;
        Self::from_raw(raw, base_dir)
    }

    fn from_raw(raw: RawConfig, base_dir: &Path) -> anyhow::Result<Self> {
        if raw.insert_batch_size == 0 {
            return Err(BenchError::InvalidConfig("insert_batch_size must be > 0".into()).into());
        }
        if raw.top_k == 0 {
            return Err(BenchError::InvalidConfig("topK must be > 0".into()).into());
        }
        if raw.mode == BenchMode::Vector && raw.vector_name.is_none() && raw.query_path.is_some() {
            return Err(
                BenchError::InvalidConfig("vector mode requires vector_name".into()).into(),
            );
        }

        let schema = raw
            .schema
            .iter()
            .map(|(name, def)| FieldSchema {
                name: name.clone(),
                data_type: def
                    .get("type")
                    .and_then(Value::as_str)
                    .or_else(|| def.as_str())
                    .unwrap_or("varchar")
                    .to_string(),
            })
            .collect();

        let indexes = parse_index_schema(&raw.index)?;

        let resolve = |p: Option<PathBuf>| p.map(|p| resolve_path(base_dir, p));

        Ok(Self {
            name: raw.name,
            schema,
            data_path: resolve(raw.data_path),
            data_link: raw.data_link,
            insert_batch_size: raw.insert_batch_size,
            query_path: resolve(raw.query_path),
            vector_name: raw.vector_name,
            metric_type: raw.metric_type,
            top_k: raw.top_k,
            mode: raw.mode,
            indexes,
            use_import: raw.use_import,
            result_path: resolve(raw.result_path),
            ground_truth_path: resolve(raw.ground_truth_path),
            fulltext_field: raw.fulltext_field,
        })
    }

    /// Declared field names, in config order
    pub fn field_names(&self) -> Vec<String> {
        self.schema.iter().map(|f| f.name.clone()).collect()
    }

    /// Dataset path, or an error if the config has none
    pub fn require_data_path(&self) -> anyhow::Result<&Path> {
        self.data_path
            .as_deref()
            .ok_or_else(|| BenchError::InvalidConfig("data_path is not set".into()).into())
    }

    /// Query path, or an error if the config has none
    pub fn require_query_path(&self) -> anyhow::Result<&Path> {
        self.query_path
            .as_deref()
            .ok_or_else(|| BenchError::InvalidConfig("query_path is not set".into()).into())
    }
}

fn resolve_path(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

/// Turn the `index` object into index specs, preserving config order
fn parse_index_schema(index: &Map<String, Value>) -> anyhow::Result<Vec<IndexSpec>> {
    let mut specs = Vec::with_capacity(index.len());

    for (field, def) in index {
        let kind = match def.get("type").and_then(Value::as_str) {
            Some(t) if t.eq_ignore_ascii_case("text") || t.eq_ignore_ascii_case("fulltext") => {
                IndexKind::FullText
            }
            Some(t) if t.eq_ignore_ascii_case("hnsw") => IndexKind::Hnsw,
            other => {
                return Err(BenchError::InvalidConfig(format!(
                    "unknown index type {:?} for field '{}'",
                    other, field
                ))
                .into())
            }
        };

        let params = match def.get("params").and_then(Value::as_object) {
            Some(obj) if kind == IndexKind::Hnsw => obj
                .iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), v)
                })
                .collect(),
            _ => Vec::new(),
        };

        specs.push(IndexSpec {
            field: field.clone(),
            kind,
            params,
        });
    }

    Ok(specs)
}
