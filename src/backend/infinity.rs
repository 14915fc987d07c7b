//! HTTP backend for an Infinity server
//!
//! Talks to the REST API under `/databases/{db}/tables/{table}`. Every
//! response carries an `error_code`; anything non-zero is an error.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::traits::{Backend, Hit, SearchKind, SearchRequest};
use super::MatchOptions;
use crate::benchmark::{FieldSchema, IndexKind, IndexSpec};
use crate::dataset::Record;
use crate::http::{check_response, create_client};

/// Infinity REST client
pub struct InfinityBackend {
    client: Client,
    base_url: String,
    database: String,
}

impl InfinityBackend {
    pub fn new(address: &str, database: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: create_client()?,
            base_url: address.trim_end_matches('/').to_string(),
            database: database.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/databases/{}/tables/{}",
            self.base_url, self.database, table
        )
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> anyhow::Result<Value> {
        let response = check_response(request.send().await?, "infinity").await?;
        let body: Value = response.json().await?;
        check_error_code(&body, what)?;
        Ok(body)
    }
}

fn check_error_code(body: &Value, what: &str) -> anyhow::Result<()> {
    let code = body.get("error_code").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 {
        let message = body
            .get("error_msg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        anyhow::bail!("infinity {} failed ({}): {}", what, code, message);
    }
    Ok(())
}

/// Column definition; `vector,128,float` expands to a typed vector column
fn field_definition(field: &FieldSchema) -> Value {
    let parts: Vec<&str> = field.data_type.split(',').map(str::trim).collect();
    match parts.as_slice() {
        ["vector", dimension, element_type] => json!({
            "name": field.name,
            "type": "vector",
            "dimension": dimension.parse::<usize>().unwrap_or(0),
            "element_type": element_type,
        }),
        _ => json!({ "name": field.name, "type": field.data_type }),
    }
}

fn index_body(spec: &IndexSpec) -> Value {
    let mut index = Map::new();
    index.insert("type".into(), Value::String(spec.kind.to_string()));
    if spec.kind == IndexKind::Hnsw {
        for (key, value) in &spec.params {
            index.insert(key.clone(), Value::String(value.clone()));
        }
    }
    json!({
        "fields": [spec.field],
        "index": index,
        "create_option": "ignore_if_exists",
    })
}

fn search_body(request: &SearchRequest<'_>) -> anyhow::Result<Value> {
    let search = match request.kind {
        SearchKind::Knn {
            field,
            vector,
            element_type,
            metric,
            k,
        } => json!({
            "match_method": "dense",
            "fields": field,
            "query_vector": vector,
            "element_type": element_type,
            "metric_type": metric,
            "topn": k,
        }),
        SearchKind::Match {
            field,
            condition,
            options,
        } => {
            let options = MatchOptions::parse(options)?;
            let field = if field.is_empty() {
                options.default_field.unwrap_or_default()
            } else {
                field.to_string()
            };
            json!({
                "match_method": "text",
                "fields": field,
                "matching_text": condition,
                "topn": options.topn.unwrap_or(10),
            })
        }
    };

    Ok(json!({
        "output": request.output,
        "search": [search],
    }))
}

/// Turn the `output` rows of a search response into hits
fn parse_hits(body: &Value) -> anyhow::Result<Vec<Hit>> {
    let rows = match body.get("output").and_then(Value::as_array) {
        Some(rows) => rows,
        None => return Ok(Vec::new()),
    };

    rows.iter()
        .map(|row| {
            let row_id = row
                .get("_row_id")
                .and_then(parse_row_id)
                .ok_or_else(|| anyhow::anyhow!("search row without _row_id: {}", row))?;
            Ok(Hit {
                row_id,
                score: row.get("_score").and_then(number).map(|s| s as f32),
            })
        })
        .collect()
}

/// Row ids are integers; never routed through f64
fn parse_row_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Numbers may come back as JSON numbers or strings
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl Backend for InfinityBackend {
    fn name(&self) -> &str {
        "infinity"
    }

    async fn drop_table(&self, table: &str) -> anyhow::Result<()> {
        let request = self
            .client
            .delete(self.table_url(table))
            .json(&json!({ "drop_option": "ignore_if_not_exists" }));
        self.send(request, "drop table").await?;
        debug!("Dropped table '{}'", table);
        Ok(())
    }

    async fn create_table(&self, table: &str, schema: &[FieldSchema]) -> anyhow::Result<()> {
        let fields: Vec<Value> = schema.iter().map(field_definition).collect();
        let request = self
            .client
            .post(self.table_url(table))
            .json(&json!({ "create_option": "error", "fields": fields }));
        self.send(request, "create table").await?;
        info!("Created table '{}' with {} columns", table, schema.len());
        Ok(())
    }

    fn supports_import(&self) -> bool {
        true
    }

    async fn import(&self, table: &str, path: &Path, delimiter: char) -> anyhow::Result<()> {
        // The server reads the file itself, so the path must be valid on its side
        let path = std::fs::canonicalize(path)?;
        let request = self.client.put(self.table_url(table)).json(&json!({
            "file_path": path.to_string_lossy(),
            "file_type": "csv",
            "header": false,
            "delimiter": delimiter.to_string(),
        }));
        self.send(request, "import").await?;
        Ok(())
    }

    async fn insert(&self, table: &str, batch: Vec<Record>) -> anyhow::Result<()> {
        let request = self
            .client
            .post(format!("{}/docs", self.table_url(table)))
            .json(&batch);
        self.send(request, "insert").await?;
        Ok(())
    }

    async fn create_index(
        &self,
        table: &str,
        index_name: &str,
        spec: &IndexSpec,
    ) -> anyhow::Result<()> {
        let request = self
            .client
            .post(format!("{}/indexes/{}", self.table_url(table), index_name))
            .json(&index_body(spec));
        self.send(request, "create index").await?;
        info!("Created {} index '{}' on {}.{}", spec.kind, index_name, table, spec.field);
        Ok(())
    }

    async fn search(&self, table: &str, request: &SearchRequest<'_>) -> anyhow::Result<Vec<Hit>> {
        let http = self
            .client
            .get(format!("{}/docs", self.table_url(table)))
            .json(&search_body(request)?);
        let body = self.send(http, "search").await?;
        parse_hits(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_definition() {
        let vector = FieldSchema {
            name: "embeddings".into(),
            data_type: "vector,128,float".into(),
        };
        assert_eq!(
            field_definition(&vector),
            json!({ "name": "embeddings", "type": "vector", "dimension": 128, "element_type": "float" })
        );

        let text = FieldSchema { name: "body".into(), data_type: "varchar".into() };
        assert_eq!(field_definition(&text), json!({ "name": "body", "type": "varchar" }));
    }

    #[test]
    fn test_index_body() {
        let spec = IndexSpec {
            field: "embeddings".into(),
            kind: IndexKind::Hnsw,
            params: vec![("M".into(), "16".into()), ("metric".into(), "l2".into())],
        };
        let body = index_body(&spec);
        assert_eq!(body["fields"], json!(["embeddings"]));
        assert_eq!(body["index"]["type"], "HNSW");
        assert_eq!(body["index"]["M"], "16");
    }

    #[test]
    fn test_search_body_match_uses_default_field() {
        let request = SearchRequest {
            output: &["_row_id", "_score"],
            kind: SearchKind::Match {
                field: "",
                condition: "harmonic series",
                options: "topn=5;default_field=body",
            },
        };
        let body = search_body(&request).unwrap();
        assert_eq!(body["output"], json!(["_row_id", "_score"]));
        assert_eq!(body["search"][0]["fields"], "body");
        assert_eq!(body["search"][0]["topn"], 5);
    }

    #[test]
    fn test_parse_hits() {
        let body = json!({
            "error_code": 0,
            "output": [
                { "_row_id": 12, "_score": "1.5" },
                { "_row_id": "7", "_score": 0.5 },
            ]
        });
        let hits = parse_hits(&body).unwrap();
        assert_eq!(hits, vec![
            Hit { row_id: 12, score: Some(1.5) },
            Hit { row_id: 7, score: Some(0.5) },
        ]);

        assert!(parse_hits(&json!({ "output": [{ "_score": 1 }] })).is_err());
    }

    #[test]
    fn test_large_row_ids_are_exact() {
        // 2^53 + 1 has no exact f64
        let body = json!({
            "output": [
                { "_row_id": 9007199254740993u64 },
                { "_row_id": "9007199254740993" },
                { "_row_id": u64::MAX },
            ]
        });
        let ids: Vec<u64> = parse_hits(&body).unwrap().iter().map(|h| h.row_id).collect();
        assert_eq!(ids, vec![9007199254740993, 9007199254740993, u64::MAX]);

        assert!(parse_hits(&json!({ "output": [{ "_row_id": -1 }] })).is_err());
        assert!(parse_hits(&json!({ "output": [{ "_row_id": 1.5 }] })).is_err());
    }

    #[test]
    fn test_error_code() {
        assert!(check_error_code(&json!({ "error_code": 0 }), "insert").is_ok());
        let err = check_error_code(
            &json!({ "error_code": 3022, "error_msg": "Table t doesn't exist" }),
            "insert",
        )
        .unwrap_err();
        assert!(err.to_string().contains("3022"));
    }
}
