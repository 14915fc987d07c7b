//! Tab-delimited text reader
//!
//! Columns map positionally onto the declared schema. Rows with the wrong
//! column count are logged and skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use tracing::info;

use super::{Record, RecordReader};

pub const DELIMITER: char = '\t';

const PROGRESS_EVERY: usize = 100_000;

pub struct DelimitedReader {
    reader: BufReader<File>,
    fields: Vec<String>,
    buf: Vec<u8>,
    row: usize,
    skipped: usize,
}

impl DelimitedReader {
    pub fn open(path: &Path, fields: Vec<String>) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        Ok(Self {
            reader: BufReader::new(file),
            fields,
            buf: Vec::new(),
            row: 0,
            skipped: 0,
        })
    }
}

impl Iterator for DelimitedReader {
    type Item = anyhow::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }

            let row = self.row;
            self.row += 1;
            if row % PROGRESS_EVERY == 0 {
                info!("row {}", row);
            }

            // Invalid UTF-8 is replaced rather than rejected
            let line = String::from_utf8_lossy(&self.buf);
            let columns: Vec<&str> = line.trim().split(DELIMITER).collect();

            if columns.len() != self.fields.len() {
                info!(
                    "row = {}, row_len = {}, not equal headers len {}, skip",
                    row,
                    columns.len(),
                    self.fields.len()
                );
                self.skipped += 1;
                continue;
            }

            let record = self
                .fields
                .iter()
                .zip(columns)
                .map(|(field, value)| (field.clone(), Value::String(value.to_string())))
                .collect();
            return Some(Ok(record));
        }
    }
}

impl RecordReader for DelimitedReader {
    fn skipped(&self) -> usize {
        self.skipped
    }
}
