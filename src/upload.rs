//! Batch upload - recreate the table, insert in fixed-size batches, build indexes

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::backend::Backend;
use crate::benchmark::BenchConfig;
use crate::dataset::{self, DatasetFormat, RecordReader};

/// What an upload did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadStats {
    pub rows: usize,
    pub batches: usize,
    pub skipped: usize,
    /// True when the backend loaded the file itself
    pub imported: bool,
    pub elapsed: Duration,
}

pub struct BatchUploader<'a> {
    backend: Arc<dyn Backend>,
    config: &'a BenchConfig,
}

impl<'a> BatchUploader<'a> {
    pub fn new(backend: Arc<dyn Backend>, config: &'a BenchConfig) -> Self {
        Self { backend, config }
    }

    /// Drop and recreate the table, load the dataset, then build indexes
    ///
    /// The dataset is located and opened first, so a bad path or format
    /// leaves an existing table untouched.
    pub async fn upload(&self) -> anyhow::Result<UploadStats> {
        let start = Instant::now();
        let table = &self.config.name;

        let path = self.config.require_data_path()?;
        dataset::ensure_dataset(path, self.config.data_link.as_deref()).await?;
        let format = DatasetFormat::from_path(path)?;

        let native = format == DatasetFormat::DelimitedText
            && self.config.use_import
            && self.backend.supports_import();
        let mut records = if native {
            None
        } else {
            Some(dataset::open_records(self.config, path)?)
        };

        self.backend.drop_table(table).await?;
        self.backend.create_table(table, &self.config.schema).await?;

        let mut stats = match records.as_mut() {
            Some(records) => self.upload_records(records.as_mut()).await?,
            None => {
                info!("Importing {:?} natively into '{}'", path, table);
                self.backend
                    .import(table, path, dataset::DELIMITER)
                    .await?;
                UploadStats {
                    imported: true,
                    ..Default::default()
                }
            }
        };

        self.build_indexes().await?;

        stats.elapsed = start.elapsed();
        info!(
            "Upload of '{}' finished: {} rows in {} batches ({} skipped) in {:.2?}",
            table, stats.rows, stats.batches, stats.skipped, stats.elapsed
        );
        Ok(stats)
    }

    /// Insert records in input order, at most `insert_batch_size` per call
    pub async fn upload_records(
        &self,
        records: &mut dyn RecordReader,
    ) -> anyhow::Result<UploadStats> {
        let start = Instant::now();
        let batch_size = self.config.insert_batch_size;
        let table = &self.config.name;

        let progress = ProgressBar::new_spinner();
        progress.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);

        let mut stats = UploadStats::default();
        let mut batch = Vec::with_capacity(batch_size);

        for record in &mut *records {
            batch.push(record?);
            if batch.len() == batch_size {
                stats.rows += batch.len();
                stats.batches += 1;
                self.backend
                    .insert(table, std::mem::replace(&mut batch, Vec::with_capacity(batch_size)))
                    .await?;
                progress.set_message(format!("Inserted {} rows", stats.rows));
            }
        }

        if !batch.is_empty() {
            stats.rows += batch.len();
            stats.batches += 1;
            self.backend.insert(table, batch).await?;
        }

        stats.skipped = records.skipped();
        stats.elapsed = start.elapsed();
        progress.finish_with_message(format!("Inserted {} rows", stats.rows));
        Ok(stats)
    }

    /// Create `index0, index1, ...` in config order
    pub async fn build_indexes(&self) -> anyhow::Result<()> {
        for (i, spec) in self.config.indexes.iter().enumerate() {
            let start = Instant::now();
            let name = format!("index{}", i);
            self.backend
                .create_index(&self.config.name, &name, spec)
                .await?;
            info!(
                "Built {} index '{}' on '{}' in {:.2?}",
                spec.kind,
                name,
                spec.field,
                start.elapsed()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{Call, RecordingBackend};
    use crate::dataset::VectorReader;
    use std::io::Write;
    use std::path::Path;

    fn config(batch_size: usize) -> BenchConfig {
        let json = format!(
            r#"{{
                "name": "t",
                "schema": {{ "vec": {{ "type": "vector,1,float" }} }},
                "insert_batch_size": {},
                "vector_name": "vec",
                "index": {{ "vec": {{ "type": "HNSW", "params": {{ "M": 8 }} }} }}
            }}"#,
            batch_size
        );
        BenchConfig::parse(&json, Path::new(".")).unwrap()
    }

    fn reader(n: usize) -> VectorReader {
        VectorReader::from_vectors((0..n).map(|i| vec![i as f32]).collect(), "vec".into(), 4)
    }

    #[tokio::test]
    async fn test_batches_cover_all_records_in_order() {
        for (n, b) in [(0, 3), (1, 3), (9, 3), (10, 3), (7, 1), (5, 100)] {
            let backend = Arc::new(RecordingBackend::default());
            let config = config(b);
            let uploader = BatchUploader::new(backend.clone(), &config);

            let stats = uploader.upload_records(&mut reader(n)).await.unwrap();

            let batches = backend.inserted_batches();
            assert_eq!(batches.len(), n.div_ceil(b), "n={} b={}", n, b);
            assert_eq!(stats.batches, batches.len());
            assert_eq!(stats.rows, n);
            assert!(batches.iter().all(|batch| batch.len() <= b && !batch.is_empty()));

            let flattened: Vec<f64> = batches
                .iter()
                .flatten()
                .map(|r| r["vec"][0].as_f64().unwrap())
                .collect();
            let expected: Vec<f64> = (0..n).map(|i| i as f64).collect();
            assert_eq!(flattened, expected);
        }
    }

    #[tokio::test]
    async fn test_malformed_csv_rows_never_inserted() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.csv");
        let mut file = std::fs::File::create(&data).unwrap();
        file.write_all(b"a\t1\nbad\nb\t2\nc\t3\t3\nd\t4\n").unwrap();

        let json = format!(
            r#"{{ "name": "t", "mode": "fulltext", "insert_batch_size": 2,
                 "schema": {{ "title": {{ "type": "varchar" }}, "num": {{ "type": "varchar" }} }},
                 "data_path": {:?} }}"#,
            data
        );
        let config = BenchConfig::parse(&json, dir.path()).unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let stats = BatchUploader::new(backend.clone(), &config).upload().await.unwrap();

        assert_eq!(stats.rows, 3);
        assert_eq!(stats.skipped, 2);
        let titles: Vec<String> = backend
            .inserted_batches()
            .iter()
            .flatten()
            .map(|r| r["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["a", "b", "d"]);
    }

    #[tokio::test]
    async fn test_table_reset_then_insert_then_index() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.json");
        std::fs::write(&data, "{\"vec\": [1.0]}\n{\"vec\": [2.0]}\n").unwrap();

        let mut config = config(1);
        config.data_path = Some(data);
        let backend = Arc::new(RecordingBackend::default());
        BatchUploader::new(backend.clone(), &config).upload().await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls[0], Call::DropTable("t".into()));
        assert_eq!(calls[1], Call::CreateTable("t".into()));
        assert!(matches!(calls[2], Call::Insert(1)));
        assert!(matches!(calls[3], Call::Insert(1)));
        assert_eq!(calls[4], Call::CreateIndex("index0".into()));
        assert_eq!(calls.len(), 5);
    }

    #[tokio::test]
    async fn test_native_import_when_supported() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.csv");
        std::fs::write(&data, "x\n").unwrap();

        let json = format!(
            r#"{{ "name": "t", "mode": "fulltext", "use_import": true,
                 "schema": {{ "title": {{ "type": "varchar" }} }}, "data_path": {:?} }}"#,
            data
        );
        let config = BenchConfig::parse(&json, dir.path()).unwrap();
        let backend = Arc::new(RecordingBackend::with_import());
        let stats = BatchUploader::new(backend.clone(), &config).upload().await.unwrap();

        assert!(stats.imported);
        assert!(backend.calls().contains(&Call::Import));
        assert!(backend.inserted_batches().is_empty());
    }

    #[tokio::test]
    async fn test_unusable_dataset_leaves_table_untouched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.parquet"), "").unwrap();

        let mut config = config(2);
        let paths = [
            None,
            Some(dir.path().join("missing.json")),
            Some(dir.path().join("data.parquet")),
        ];
        for data_path in paths {
            config.data_path = data_path;
            let backend = Arc::new(RecordingBackend::default());
            let result = BatchUploader::new(backend.clone(), &config).upload().await;

            assert!(result.is_err(), "data_path {:?}", config.data_path);
            assert!(backend.calls().is_empty(), "data_path {:?}", config.data_path);
        }
    }
}
