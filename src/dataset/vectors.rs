//! HDF5 vector arrays (ann-benchmarks layout: train / test / neighbors)
//!
//! Needs the `hdf5` feature; without it every call fails with
//! `FeatureDisabled`. Base vectors are streamed in row chunks; query vectors
//! and neighbor ids are small and read whole.

use std::ops::Range;
use std::path::Path;

use serde_json::Value;

use super::{Record, RecordReader};

/// Read a 2-D float dataset, one vector per row
#[cfg(feature = "hdf5")]
pub fn read_vectors(path: &Path, dataset: &str) -> anyhow::Result<Vec<Vec<f32>>> {
    let file = open_file(path)?;
    let array = open_dataset(&file, path, dataset)?.read_2d::<f32>()?;
    Ok(array.outer_iter().map(|row| row.to_vec()).collect())
}

/// Read a 2-D integer dataset of row ids, one list per row
#[cfg(feature = "hdf5")]
pub fn read_ids(path: &Path, dataset: &str) -> anyhow::Result<Vec<Vec<u64>>> {
    let file = open_file(path)?;
    let array = open_dataset(&file, path, dataset)?.read_2d::<i64>()?;
    Ok(array
        .outer_iter()
        .map(|row| row.iter().map(|id| *id as u64).collect())
        .collect())
}

#[cfg(not(feature = "hdf5"))]
pub fn read_vectors(_path: &Path, _dataset: &str) -> anyhow::Result<Vec<Vec<f32>>> {
    Err(crate::error::BenchError::FeatureDisabled("hdf5").into())
}

#[cfg(not(feature = "hdf5"))]
pub fn read_ids(_path: &Path, _dataset: &str) -> anyhow::Result<Vec<Vec<u64>>> {
    Err(crate::error::BenchError::FeatureDisabled("hdf5").into())
}

#[cfg(feature = "hdf5")]
fn open_file(path: &Path) -> anyhow::Result<::hdf5::File> {
    use anyhow::Context;
    ::hdf5::File::open(path).with_context(|| format!("Failed to open {:?}", path))
}

#[cfg(feature = "hdf5")]
fn open_dataset(file: &::hdf5::File, path: &Path, dataset: &str) -> anyhow::Result<::hdf5::Dataset> {
    use anyhow::Context;
    file.dataset(dataset)
        .with_context(|| format!("No '{}' dataset in {:?}", dataset, path))
}

/// Row-range access to a 2-D float array
#[cfg_attr(not(any(feature = "hdf5", test)), allow(dead_code))]
trait VectorSource: Send {
    fn rows(&self) -> usize;

    fn read_rows(&self, rows: Range<usize>) -> anyhow::Result<Vec<Vec<f32>>>;
}

#[cfg(feature = "hdf5")]
struct Hdf5Source {
    // Held so the file stays open for the dataset's lifetime
    _file: ::hdf5::File,
    dataset: ::hdf5::Dataset,
    rows: usize,
}

#[cfg(feature = "hdf5")]
impl VectorSource for Hdf5Source {
    fn rows(&self) -> usize {
        self.rows
    }

    fn read_rows(&self, rows: Range<usize>) -> anyhow::Result<Vec<Vec<f32>>> {
        let array = self
            .dataset
            .read_slice_2d::<f32, _>(ndarray::s![rows.start..rows.end, ..])?;
        Ok(array.outer_iter().map(|row| row.to_vec()).collect())
    }
}

#[cfg(test)]
impl VectorSource for Vec<Vec<f32>> {
    fn rows(&self) -> usize {
        self.len()
    }

    fn read_rows(&self, rows: Range<usize>) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(self[rows].to_vec())
    }
}

/// Streams vectors as single-field records, `chunk_rows` rows per read
pub struct VectorReader {
    source: Box<dyn VectorSource>,
    field: String,
    chunk_rows: usize,
    next_row: usize,
    buffered: std::vec::IntoIter<Vec<f32>>,
}

impl VectorReader {
    #[cfg(feature = "hdf5")]
    pub fn open(path: &Path, dataset: &str, field: String, chunk_rows: usize) -> anyhow::Result<Self> {
        let file = open_file(path)?;
        let dataset = open_dataset(&file, path, dataset)?;
        let shape = dataset.shape();
        if shape.len() != 2 {
            anyhow::bail!("Expected a 2-D vector dataset in {:?}, found shape {:?}", path, shape);
        }
        let source = Hdf5Source {
            rows: shape[0],
            _file: file,
            dataset,
        };
        Ok(Self::from_source(Box::new(source), field, chunk_rows))
    }

    #[cfg(not(feature = "hdf5"))]
    pub fn open(_path: &Path, _dataset: &str, _field: String, _chunk_rows: usize) -> anyhow::Result<Self> {
        Err(crate::error::BenchError::FeatureDisabled("hdf5").into())
    }

    #[cfg(test)]
    pub fn from_vectors(vectors: Vec<Vec<f32>>, field: String, chunk_rows: usize) -> Self {
        Self::from_source(Box::new(vectors), field, chunk_rows)
    }

    #[cfg_attr(not(any(feature = "hdf5", test)), allow(dead_code))]
    fn from_source(source: Box<dyn VectorSource>, field: String, chunk_rows: usize) -> Self {
        Self {
            source,
            field,
            chunk_rows: chunk_rows.max(1),
            next_row: 0,
            buffered: Vec::new().into_iter(),
        }
    }

    fn record(&self, vector: Vec<f32>) -> Record {
        let mut record = Record::new();
        record.insert(
            self.field.clone(),
            Value::Array(vector.into_iter().map(Value::from).collect()),
        );
        record
    }
}

impl Iterator for VectorReader {
    type Item = anyhow::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(vector) = self.buffered.next() {
                return Some(Ok(self.record(vector)));
            }

            let rows = self.source.rows();
            if self.next_row >= rows {
                return None;
            }

            let end = (self.next_row + self.chunk_rows).min(rows);
            match self.source.read_rows(self.next_row..end) {
                Ok(chunk) => {
                    self.buffered = chunk.into_iter();
                    self.next_row = end;
                }
                Err(e) => {
                    self.next_row = rows;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl RecordReader for VectorReader {}
