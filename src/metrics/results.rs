//! Result files: one JSON array per measured query, latency last
//!
//! Vector runs write `[[id, id, ...], latency]`; full-text runs write
//! `[[id, score], [id, score], ..., latency]`.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde_json::{json, Value};

use crate::backend::Hit;
use crate::benchmark::BenchMode;
use crate::query::SearchResult;

/// Write every result, one line per query
pub fn save_results(path: &Path, results: &[SearchResult], mode: BenchMode) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);

    for result in results {
        let line = encode(result, mode);
        serde_json::to_writer(&mut writer, &line)?;
        writer.write_all(b"\n")?;
    }

    writer.flush()?;
    Ok(())
}

fn encode(result: &SearchResult, mode: BenchMode) -> Value {
    let mut items: Vec<Value> = match mode {
        BenchMode::Vector => vec![json!(result.row_ids().collect::<Vec<_>>())],
        BenchMode::Fulltext => result
            .hits
            .iter()
            .map(|hit| json!([hit.row_id, hit.score]))
            .collect(),
    };
    items.push(json!(result.latency_ms));
    Value::Array(items)
}

/// Read a result file written by `save_results`
pub fn load_results(path: &Path, mode: BenchMode) -> anyhow::Result<Vec<SearchResult>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut results = Vec::new();

    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .with_context(|| format!("Invalid result on line {} of {:?}", i + 1, path))?;
        let result = decode(&value, mode)
            .with_context(|| format!("Malformed result on line {} of {:?}", i + 1, path))?;
        results.push(result);
    }

    Ok(results)
}

fn decode(value: &Value, mode: BenchMode) -> anyhow::Result<SearchResult> {
    let items = value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("expected a JSON array"))?;
    let (latency, rest) = items
        .split_last()
        .ok_or_else(|| anyhow::anyhow!("empty result array"))?;
    let latency_ms = latency
        .as_f64()
        .ok_or_else(|| anyhow::anyhow!("latency is not a number"))?;

    let hits = match mode {
        BenchMode::Vector => rest
            .first()
            .and_then(Value::as_array)
            .map(|ids| ids.iter().map(id_hit).collect::<anyhow::Result<Vec<Hit>>>())
            .unwrap_or_else(|| Ok(Vec::new()))?,
        BenchMode::Fulltext => rest
            .iter()
            .map(pair_hit)
            .collect::<anyhow::Result<Vec<Hit>>>()?,
    };

    Ok(SearchResult { hits, latency_ms })
}

fn id_hit(value: &Value) -> anyhow::Result<Hit> {
    Ok(Hit {
        row_id: parse_id(value)?,
        score: None,
    })
}

fn pair_hit(value: &Value) -> anyhow::Result<Hit> {
    match value.as_array().map(Vec::as_slice) {
        Some([id, score, ..]) => Ok(Hit {
            row_id: parse_id(id)?,
            score: score.as_f64().map(|s| s as f32),
        }),
        Some([id]) => id_hit(id),
        _ => id_hit(value),
    }
}

/// Row ids are written as numbers but some engines return strings
pub fn parse_id(value: &Value) -> anyhow::Result<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| anyhow::anyhow!("row id {} is not an unsigned integer", n)),
        Value::String(s) => Ok(s.parse()?),
        other => anyhow::bail!("row id {} is not a number", other),
    }
}
