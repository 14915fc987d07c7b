//! Expected result ids per query

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use super::results::parse_id;
use crate::dataset::{self, DatasetFormat, NEIGHBORS_DATASET};
use crate::error::BenchError;

/// Expected row ids for each query, in query order, at most k per query
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    expected: Vec<Vec<u64>>,
}

impl GroundTruth {
    /// Load ground truth and truncate every entry to `k` ids
    ///
    /// HDF5 files use the `neighbors` dataset. JSON lines files hold one
    /// array per query of `[id, score]` pairs whose last element is reserved.
    pub fn load(path: &Path, k: usize) -> anyhow::Result<Self> {
        let expected = match DatasetFormat::from_path(path)? {
            DatasetFormat::Hdf5 => dataset::read_ids(path, NEIGHBORS_DATASET)?,
            DatasetFormat::JsonLines => read_json(path)?,
            _ => return Err(BenchError::unsupported(path).into()),
        };

        tracing::debug!("Loaded ground truth for {} queries from {:?}", expected.len(), path);
        Ok(Self::from_ids(expected, k))
    }

    pub fn from_ids(expected: Vec<Vec<u64>>, k: usize) -> Self {
        let expected = expected
            .into_iter()
            .map(|mut ids| {
                ids.truncate(k);
                ids
            })
            .collect();
        Self { expected }
    }

    pub fn len(&self) -> usize {
        self.expected.len()
    }

    pub fn get(&self, i: usize) -> Option<&[u64]> {
        self.expected.get(i).map(Vec::as_slice)
    }
}

fn read_json(path: &Path) -> anyhow::Result<Vec<Vec<u64>>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut expected = Vec::new();

    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .with_context(|| format!("Invalid ground truth on line {} of {:?}", i + 1, path))?;
        let ids = line_ids(&value)
            .with_context(|| format!("Malformed ground truth on line {} of {:?}", i + 1, path))?;
        expected.push(ids);
    }

    Ok(expected)
}

fn line_ids(value: &Value) -> anyhow::Result<Vec<u64>> {
    let items = value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("expected a JSON array"))?;
    let Some((_, pairs)) = items.split_last() else {
        return Ok(Vec::new());
    };

    pairs
        .iter()
        .map(|pair| match pair {
            Value::Array(pair) => pair
                .first()
                .ok_or_else(|| anyhow::anyhow!("empty [id, score] pair"))
                .and_then(parse_id),
            id => parse_id(id),
        })
        .collect()
}
