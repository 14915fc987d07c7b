//! Query module - load query files and replay them against a backend

mod replay;

pub use replay::{run_express, ExpressReport, Replayer};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;

use crate::backend::{Hit, MatchOptions, SearchKind, SearchRequest};
use crate::benchmark::{BenchConfig, BenchMode};
use crate::dataset::{self, DatasetFormat, TEST_DATASET};
use crate::error::BenchError;

const VECTOR_OUTPUT: &[&str] = &["_row_id"];
const FULLTEXT_OUTPUT: &[&str] = &["_row_id", "_score"];

/// One query to replay
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Vector(Vec<f32>),
    FullText(String),
}

/// Result of one measured query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub hits: Vec<Hit>,
    pub latency_ms: f64,
}

impl SearchResult {
    pub fn row_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.hits.iter().map(|h| h.row_id)
    }
}

/// Queries in file order
#[derive(Debug, Clone)]
pub struct QuerySet {
    queries: Vec<Query>,
    path: PathBuf,
}

impl QuerySet {
    /// Load the configured query file
    pub fn load(config: &BenchConfig) -> anyhow::Result<Self> {
        let path = config.require_query_path()?;
        let queries: Vec<Query> = match DatasetFormat::from_path(path)? {
            DatasetFormat::Hdf5 => dataset::read_vectors(path, TEST_DATASET)?
                .into_iter()
                .map(Query::Vector)
                .collect(),
            DatasetFormat::PlainText => {
                if config.mode != BenchMode::Fulltext {
                    return Err(BenchError::InvalidConfig(
                        "text query files require mode \"fulltext\"".into(),
                    )
                    .into());
                }
                read_lines(path)?
                    .into_iter()
                    .map(Query::FullText)
                    .collect()
            }
            DatasetFormat::JsonLines => read_lines(path)?
                .iter()
                .enumerate()
                .map(|(i, line)| {
                    let value: Value = serde_json::from_str(line)
                        .with_context(|| format!("Invalid JSON query on line {}", i + 1))?;
                    Ok(Query::FullText(compose_query(&value)?))
                })
                .collect::<anyhow::Result<_>>()?,
            DatasetFormat::DelimitedText => return Err(BenchError::unsupported(path).into()),
        };

        Self::from_queries(queries, path)
    }

    pub fn from_queries(queries: Vec<Query>, path: &Path) -> anyhow::Result<Self> {
        if queries.is_empty() {
            return Err(BenchError::EmptyQuerySet(path.to_path_buf()).into());
        }
        Ok(Self {
            queries,
            path: path.to_path_buf(),
        })
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn get(&self, i: usize) -> Option<&Query> {
        self.queries.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Query> {
        self.queries.iter()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Trimmed, non-empty lines
fn read_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// Build a condition string from a JSON query
///
/// Accepts `{"body": {"query": C}}`, `{"query": C}` or `C`, where `C` is a
/// string or a single-operator object: `{"match": {f: t}}`,
/// `{"and": {f1: t1, f2: t2}}`, `{"or": {...}}`. Every sub-condition
/// becomes `field:"text"`, with `"` and `\` in the text backslash-escaped.
pub fn compose_query(value: &Value) -> anyhow::Result<String> {
    let condition = value
        .pointer("/body/query")
        .or_else(|| value.get("query"))
        .unwrap_or(value);

    let object = match condition {
        Value::String(s) => return Ok(s.trim().to_string()),
        Value::Object(object) => object,
        other => anyhow::bail!("Unsupported query condition: {}", other),
    };

    let (op, terms) = object
        .iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty query condition"))?;
    let terms = terms
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("Operator '{}' expects an object of field: text", op))?;

    let joiner = match op.to_lowercase().as_str() {
        "match" | "and" => " AND ",
        "or" => " OR ",
        other => return Err(BenchError::UnknownOperator(other.to_string()).into()),
    };

    let clauses: Vec<String> = terms
        .iter()
        .map(|(field, text)| {
            let text = match text {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let text = text.replace('\\', "\\\\").replace('"', "\\\"");
            format!("{}:\"{}\"", field, text)
        })
        .collect();

    if clauses.is_empty() {
        anyhow::bail!("Operator '{}' has no sub-conditions", op);
    }
    Ok(clauses.join(joiner))
}

/// Per-benchmark search parameters, fixed for a run
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub vector_field: String,
    pub metric: String,
    pub top_k: usize,
    match_options: String,
}

impl QueryParams {
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            vector_field: config.vector_name.clone().unwrap_or_default(),
            metric: config.metric_type.clone(),
            top_k: config.top_k,
            match_options: MatchOptions::format(config.top_k, &config.fulltext_field),
        }
    }

    /// Backend request for one query
    pub fn request<'a>(&'a self, query: &'a Query) -> SearchRequest<'a> {
        match query {
            Query::Vector(vector) => SearchRequest {
                output: VECTOR_OUTPUT,
                kind: SearchKind::Knn {
                    field: &self.vector_field,
                    vector,
                    element_type: "float",
                    metric: &self.metric,
                    k: self.top_k,
                },
            },
            Query::FullText(condition) => SearchRequest {
                output: FULLTEXT_OUTPUT,
                kind: SearchKind::Match {
                    field: "",
                    condition,
                    options: &self.match_options,
                },
            },
        }
    }
}
