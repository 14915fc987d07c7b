//! Dataset module - stream records out of dataset files

mod delimited;
mod download;
mod vectors;
mod jsonl;

pub use delimited::{DelimitedReader, DELIMITER};
pub use download::ensure_dataset;
pub use vectors::{read_ids, read_vectors, VectorReader};
pub use jsonl::JsonLinesReader;

use std::path::Path;

use crate::benchmark::BenchConfig;
use crate::error::BenchError;

/// One row to insert: field name -> value
pub type Record = serde_json::Map<String, serde_json::Value>;

/// HDF5 dataset holding base vectors
pub const TRAIN_DATASET: &str = "train";
/// HDF5 dataset holding query vectors
pub const TEST_DATASET: &str = "test";
/// HDF5 dataset holding nearest-neighbor ids
pub const NEIGHBORS_DATASET: &str = "neighbors";

/// File formats, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    JsonLines,
    Hdf5,
    DelimitedText,
    PlainText,
}

impl DatasetFormat {
    pub fn from_path(path: &Path) -> Result<Self, BenchError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "json" | "jsonl" => Ok(DatasetFormat::JsonLines),
            "hdf5" | "h5" => Ok(DatasetFormat::Hdf5),
            "csv" | "tsv" => Ok(DatasetFormat::DelimitedText),
            "txt" => Ok(DatasetFormat::PlainText),
            _ => Err(BenchError::unsupported(path)),
        }
    }
}

/// A finite, non-restartable stream of records
pub trait RecordReader: Iterator<Item = anyhow::Result<Record>> + Send {
    /// Rows dropped as malformed so far
    fn skipped(&self) -> usize {
        0
    }
}

/// Open the reader matching the dataset's format
pub fn open_records(
    config: &BenchConfig,
    path: &Path,
) -> anyhow::Result<Box<dyn RecordReader>> {
    match DatasetFormat::from_path(path)? {
        DatasetFormat::JsonLines => Ok(Box::new(JsonLinesReader::open(
            path,
            config.field_names(),
        )?)),
        DatasetFormat::Hdf5 => {
            let field = config.vector_name.clone().ok_or_else(|| {
                BenchError::InvalidConfig("HDF5 datasets require vector_name".into())
            })?;
            Ok(Box::new(VectorReader::open(
                path,
                TRAIN_DATASET,
                field,
                config.insert_batch_size,
            )?))
        }
        DatasetFormat::DelimitedText => Ok(Box::new(DelimitedReader::open(
            path,
            config.field_names(),
        )?)),
        DatasetFormat::PlainText => Err(BenchError::unsupported(path).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            DatasetFormat::from_path(Path::new("a/enwiki.json")).unwrap(),
            DatasetFormat::JsonLines
        );
        assert_eq!(
            DatasetFormat::from_path(Path::new("sift.HDF5")).unwrap(),
            DatasetFormat::Hdf5
        );
        assert_eq!(
            DatasetFormat::from_path(Path::new("enwiki.csv")).unwrap(),
            DatasetFormat::DelimitedText
        );
        assert_eq!(
            DatasetFormat::from_path(Path::new("queries.txt")).unwrap(),
            DatasetFormat::PlainText
        );
    }

    #[test]
    fn test_unsupported_extension() {
        let err = DatasetFormat::from_path(Path::new("data.parquet")).unwrap_err();
        assert!(matches!(err, BenchError::UnsupportedFormat { .. }));
        assert!(DatasetFormat::from_path(Path::new("noext")).is_err());
    }
}
