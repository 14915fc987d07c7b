//! HTTP utilities for remote backends and dataset downloads

use std::time::Duration;

use reqwest::{Client, Response};

/// Create a reqwest client with connection pooling and sensible defaults
///
/// No overall request timeout; slow backend calls are measured as latency.
pub fn create_client() -> anyhow::Result<Client> {
    let client = Client::builder()
        .user_agent(concat!("searchbench/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(64)
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(Duration::from_secs(30))
        .build()?;
    Ok(client)
}

/// Check HTTP response status and return detailed error if not successful
pub async fn check_response(response: Response, service_name: &str) -> anyhow::Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    anyhow::bail!("{} error {}: {}", service_name, status, error_detail(&body))
}

/// Pull a human readable message out of an error body
pub fn error_detail(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => json
            .get("error_msg")
            .and_then(|m| m.as_str())
            .or_else(|| {
                json.get("error")
                    .and_then(|e| e.get("message").and_then(|m| m.as_str()))
            })
            .or_else(|| json.get("message").and_then(|m| m.as_str()))
            .or_else(|| json.get("detail").and_then(|d| d.as_str()))
            .map(|s| s.to_string())
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.to_string(),
    }
}
