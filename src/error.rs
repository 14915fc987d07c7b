//! Domain errors that callers may want to match on
//!
//! Everything else is carried as `anyhow::Error` with context attached.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("unsupported file type '{extension}' for {path:?}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("dataset {0:?} does not exist and no data_link is configured")]
    MissingDataset(PathBuf),

    #[error("{0} support not available. Rebuild with --features {0}")]
    FeatureDisabled(&'static str),

    #[error("ground truth has {expected} queries but {actual} results were measured")]
    GroundTruthMismatch { expected: usize, actual: usize },

    #[error("invalid benchmark config: {0}")]
    InvalidConfig(String),

    #[error("query file {0:?} contains no queries")]
    EmptyQuerySet(PathBuf),

    #[error("`{0}` needs a table from an earlier upload, but the memory backend keeps nothing between runs; use `searchbench run`")]
    InProcessBackend(&'static str),

    #[error("unknown full-text operator '{0}' (expected match, and, or)")]
    UnknownOperator(String),
}

impl BenchError {
    /// Build an `UnsupportedFormat` error from a path
    pub fn unsupported(path: &std::path::Path) -> Self {
        BenchError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_unsupported_message() {
        let err = BenchError::unsupported(Path::new("data/queries.parquet"));
        assert!(err.to_string().contains("'parquet'"));
    }

    #[test]
    fn test_mismatch_message() {
        let err = BenchError::GroundTruthMismatch { expected: 10, actual: 9 };
        assert_eq!(
            err.to_string(),
            "ground truth has 10 queries but 9 results were measured"
        );
    }
}
