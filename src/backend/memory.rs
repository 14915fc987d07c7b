//! In-process reference backend
//!
//! Rows live in memory and row ids are insertion offsets. Vector columns are
//! searched by brute force unless an HNSW index (usearch) exists for the
//! requested metric; text columns need a full-text index (BM25).

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use super::bm25::{top_scored, Bm25Scorer};
use super::traits::{Backend, Hit, SearchKind, SearchRequest};
use super::MatchOptions;
use crate::benchmark::{FieldSchema, IndexKind, IndexSpec};
use crate::dataset::Record;

static CLAUSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(\w+)\s*:\s*"(.*)"$"#).expect("static clause regex"));

/// Memory backend holding every table in-process
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<FxHashMap<String, Table>>,
}

struct Table {
    fields: Vec<FieldSchema>,
    rows: Vec<Record>,
    index_names: Vec<String>,
    specs: Vec<IndexSpec>,
    text: FxHashMap<String, Bm25Scorer>,
    hnsw: FxHashMap<String, HnswIndex>,
}

struct HnswIndex {
    index: Index,
    metric: Metric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    L2,
    Ip,
    Cosine,
}

impl Metric {
    fn parse(name: &str) -> anyhow::Result<Self> {
        match name.to_lowercase().as_str() {
            "l2" | "euclidean" => Ok(Metric::L2),
            "ip" | "inner_product" | "dot" => Ok(Metric::Ip),
            "cosine" | "cos" | "angular" => Ok(Metric::Cosine),
            other => anyhow::bail!("Unsupported metric type: {}", other),
        }
    }

    fn kind(self) -> MetricKind {
        match self {
            Metric::L2 => MetricKind::L2sq,
            Metric::Ip => MetricKind::IP,
            Metric::Cosine => MetricKind::Cos,
        }
    }

    /// Score where larger is better
    fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::L2 => -a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>(),
            Metric::Ip => dot(a, b),
            Metric::Cosine => {
                let norm = (dot(a, a) * dot(b, b)).sqrt();
                if norm == 0.0 {
                    0.0
                } else {
                    dot(a, b) / norm
                }
            }
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in a table
    #[cfg(test)]
    pub async fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.read().await.get(table).map(|t| t.rows.len())
    }
}

impl Table {
    fn build_index(&mut self, spec: &IndexSpec) -> anyhow::Result<()> {
        match spec.kind {
            IndexKind::FullText => {
                let scorer = Bm25Scorer::build(
                    self.rows
                        .iter()
                        .map(|row| row.get(&spec.field).and_then(Value::as_str).unwrap_or("")),
                );
                self.text.insert(spec.field.clone(), scorer);
            }
            IndexKind::Hnsw => {
                let hnsw = build_hnsw(&self.fields, &self.rows, spec)?;
                self.hnsw.insert(spec.field.clone(), hnsw);
            }
        }
        Ok(())
    }

    fn knn(&self, field: &str, query: &[f32], metric: &str, k: usize) -> anyhow::Result<Vec<Hit>> {
        let metric = Metric::parse(metric)?;

        if let Some(hnsw) = self.hnsw.get(field).filter(|h| h.metric == metric) {
            let results = hnsw.index.search(query, k)?;
            return Ok(results
                .keys
                .iter()
                .zip(results.distances.iter())
                .map(|(key, distance)| Hit {
                    row_id: *key,
                    score: Some(*distance),
                })
                .collect());
        }

        debug!("Brute-force scan of '{}' ({} rows)", field, self.rows.len());
        let mut scored = Vec::with_capacity(self.rows.len());
        for (row_id, row) in self.rows.iter().enumerate() {
            if let Some(vector) = vector_of(row, field) {
                scored.push((row_id, metric.score(&vector, query)));
            }
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(row_id, score)| Hit {
                row_id: row_id as u64,
                score: Some(score),
            })
            .collect())
    }

    fn matches(&self, field: &str, condition: &str, options: &str) -> anyhow::Result<Vec<Hit>> {
        let options = MatchOptions::parse(options)?;
        let default_field = if field.is_empty() {
            options.default_field.as_deref().unwrap_or("")
        } else {
            field
        };
        let topn = options.topn.unwrap_or(10);

        let mut total: FxHashMap<usize, f32> = FxHashMap::default();
        for group in parse_condition(condition) {
            // Rows matching every clause so far, with summed scores
            let mut group_hits: Option<FxHashMap<usize, f32>> = None;

            for (clause_field, text) in group {
                let clause_field = clause_field.unwrap_or(default_field);
                let scorer = self.text.get(clause_field).ok_or_else(|| {
                    anyhow::anyhow!("No full-text index on field '{}'", clause_field)
                })?;
                let clause = scorer.score_query(&text);
                group_hits = Some(match group_hits {
                    None => clause,
                    Some(mut hits) => {
                        hits.retain(|row, score| match clause.get(row) {
                            Some(s) => {
                                *score += s;
                                true
                            }
                            None => false,
                        });
                        hits
                    }
                });
            }

            for (row, score) in group_hits.unwrap_or_default() {
                *total.entry(row).or_insert(0.0) += score;
            }
        }

        Ok(top_scored(total, topn)
            .into_iter()
            .map(|(row_id, score)| Hit {
                row_id: row_id as u64,
                score: Some(score),
            })
            .collect())
    }
}

/// Split a condition into OR-groups of AND-ed `(field, text)` clauses
///
/// A clause is either `field:"text"` or bare text for the default field.
/// Operators inside double quotes are part of the text, and `\"` or `\\`
/// escape a quote or backslash there.
fn parse_condition(condition: &str) -> Vec<Vec<(Option<&str>, String)>> {
    split_unquoted(condition, " OR ")
        .into_iter()
        .map(|group| {
            split_unquoted(group, " AND ")
                .into_iter()
                .map(str::trim)
                .filter(|clause| !clause.is_empty())
                .map(|clause| match CLAUSE_REGEX.captures(clause) {
                    Some(caps) => {
                        let field = caps.get(1).map(|m| m.as_str());
                        let text = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                        (field, unescape(text))
                    }
                    None => (None, unescape(clause.trim_matches('"'))),
                })
                .collect::<Vec<_>>()
        })
        .filter(|group| !group.is_empty())
        .collect()
}

/// Split on `sep` wherever it occurs outside double quotes
fn split_unquoted<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if escaped {
            escaped = false;
        } else if in_quotes && b == b'\\' {
            escaped = true;
        } else if b == b'"' {
            in_quotes = !in_quotes;
        } else if !in_quotes && bytes[i..].starts_with(sep.as_bytes()) {
            parts.push(&text[start..i]);
            i += sep.len();
            start = i;
            continue;
        }
        i += 1;
    }
    parts.push(&text[start..]);
    parts
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

fn vector_of(row: &Record, field: &str) -> Option<Vec<f32>> {
    row.get(field)?
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// Dimension from a `vector,<dim>,<type>` column type
fn declared_dimensions(fields: &[FieldSchema], field: &str) -> Option<usize> {
    let schema = fields.iter().find(|f| f.name == field)?;
    let mut parts = schema.data_type.split(',').map(str::trim);
    match parts.next() {
        Some("vector") => parts.next()?.parse().ok(),
        _ => None,
    }
}

fn build_hnsw(fields: &[FieldSchema], rows: &[Record], spec: &IndexSpec) -> anyhow::Result<HnswIndex> {
    let vectors: Vec<Vec<f32>> = rows
        .iter()
        .map(|row| {
            vector_of(row, &spec.field)
                .ok_or_else(|| anyhow::anyhow!("Row is missing vector field '{}'", spec.field))
        })
        .collect::<anyhow::Result<_>>()?;

    let dimensions = declared_dimensions(fields, &spec.field)
        .or_else(|| vectors.first().map(Vec::len))
        .ok_or_else(|| anyhow::anyhow!("Cannot infer dimensions of '{}'", spec.field))?;

    let metric = Metric::parse(spec.param("metric").unwrap_or("l2"))?;
    let param = |name: &str, default: usize| -> anyhow::Result<usize> {
        match spec.param(name) {
            Some(v) => Ok(v.parse()?),
            None => Ok(default),
        }
    };
    let connectivity = param("M", 16)?;
    let expansion_add = param("ef_construction", 200)?;
    let expansion_search = param("ef", expansion_add)?;

    info!(
        "Building HNSW index on '{}': {} vectors, {} dims, M={}, ef_construction={}",
        spec.field,
        vectors.len(),
        dimensions,
        connectivity,
        expansion_add
    );

    let options = IndexOptions {
        dimensions,
        metric: metric.kind(),
        quantization: ScalarKind::F32,
        connectivity,
        expansion_add,
        expansion_search,
        multi: false,
    };

    let index = Index::new(&options)?;
    index.reserve(vectors.len())?;

    for (row_id, vector) in vectors.iter().enumerate() {
        if vector.len() != dimensions {
            anyhow::bail!(
                "Row {} has {} dims, index '{}' expects {}",
                row_id,
                vector.len(),
                spec.field,
                dimensions
            );
        }
        index.add(row_id as u64, vector)?;
    }

    Ok(HnswIndex { index, metric })
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn drop_table(&self, table: &str) -> anyhow::Result<()> {
        if self.tables.write().await.remove(table).is_some() {
            debug!("Dropped table '{}'", table);
        }
        Ok(())
    }

    async fn create_table(&self, table: &str, schema: &[FieldSchema]) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        if tables.contains_key(table) {
            anyhow::bail!("Table '{}' already exists", table);
        }
        tables.insert(
            table.to_string(),
            Table {
                fields: schema.to_vec(),
                rows: Vec::new(),
                index_names: Vec::new(),
                specs: Vec::new(),
                text: FxHashMap::default(),
                hnsw: FxHashMap::default(),
            },
        );
        Ok(())
    }

    async fn insert(&self, table: &str, batch: Vec<Record>) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        let t = tables
            .get_mut(table)
            .ok_or_else(|| anyhow::anyhow!("Table '{}' not found", table))?;
        t.rows.extend(batch);

        // Rows inserted after index creation are folded in by rebuilding
        let specs = t.specs.clone();
        for spec in &specs {
            t.build_index(spec)?;
        }
        Ok(())
    }

    async fn create_index(
        &self,
        table: &str,
        index_name: &str,
        spec: &IndexSpec,
    ) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        let t = tables
            .get_mut(table)
            .ok_or_else(|| anyhow::anyhow!("Table '{}' not found", table))?;
        if t.index_names.iter().any(|n| n == index_name) {
            anyhow::bail!("Index '{}' already exists on '{}'", index_name, table);
        }

        t.build_index(spec)?;
        t.index_names.push(index_name.to_string());
        t.specs.push(spec.clone());
        info!("Created {} index '{}' on {}.{}", spec.kind, index_name, table, spec.field);
        Ok(())
    }

    async fn search(&self, table: &str, request: &SearchRequest<'_>) -> anyhow::Result<Vec<Hit>> {
        let tables = self.tables.read().await;
        let t = tables
            .get(table)
            .ok_or_else(|| anyhow::anyhow!("Table '{}' not found", table))?;

        let mut hits = match request.kind {
            SearchKind::Knn {
                field,
                vector,
                metric,
                k,
                ..
            } => t.knn(field, vector, metric, k)?,
            SearchKind::Match {
                field,
                condition,
                options,
            } => t.matches(field, condition, options)?,
        };

        if !request.output.contains(&"_score") {
            for hit in &mut hits {
                hit.score = None;
            }
        }
        Ok(hits)
    }
}
