//! JSON lines reader - one record per line

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use super::{Record, RecordReader};

/// Projects each line onto the declared fields; missing fields become `""`
pub struct JsonLinesReader {
    lines: Lines<BufReader<File>>,
    fields: Vec<String>,
    line_no: usize,
}

impl JsonLinesReader {
    pub fn open(path: &Path, fields: Vec<String>) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            fields,
            line_no: 0,
        })
    }

    fn project(&self, line: &str) -> anyhow::Result<Record> {
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("Invalid JSON on line {}", self.line_no))?;
        let object = value
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("Line {} is not a JSON object", self.line_no))?;

        Ok(self
            .fields
            .iter()
            .map(|field| {
                let v = object
                    .get(field)
                    .cloned()
                    .unwrap_or_else(|| Value::String(String::new()));
                (field.clone(), v)
            })
            .collect())
    }
}

impl Iterator for JsonLinesReader {
    type Item = anyhow::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(self.project(&line));
        }
    }
}

impl RecordReader for JsonLinesReader {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_projects_declared_fields() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, r#"{{"doctitle": "Rust", "body": "systems", "extra": 1}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"body": "only body"}}"#).unwrap();

        let fields = vec!["doctitle".to_string(), "body".to_string()];
        let records: Vec<Record> = JsonLinesReader::open(file.path(), fields)
            .unwrap()
            .collect::<anyhow::Result<_>>()
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["doctitle"], "Rust");
        assert!(!records[0].contains_key("extra"));
        assert_eq!(records[1]["doctitle"], "");
        assert_eq!(records[1]["body"], "only body");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, "not json").unwrap();

        let mut reader = JsonLinesReader::open(file.path(), vec!["body".into()]).unwrap();
        let err = reader.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
