// src/backend/http.rs
use crate::error::{PipelineError, Result};
use crate::utils::truncate_chars;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, trace};

/// Longest slice of an error body carried into an error message
const MAX_ERROR_BODY_CHARS: usize = 500;

pub(crate) fn build_client(backend: &str, timeout: Duration) -> Result<Client> {
    Client::builder().timeout(timeout).build().map_err(|e| {
        PipelineError::Environment(format!(
            "failed to create HTTP client for {} backend: {}",
            backend, e
        ))
    })
}

/// POST `body` as JSON and return the parsed JSON response. Transport errors,
/// non-2xx statuses and non-JSON bodies all surface as backend errors.
pub(crate) async fn post_json(
    request: RequestBuilder,
    backend: &str,
    body: &Value,
) -> Result<Value> {
    let response = request.json(body).send().await.map_err(|e| {
        let reason = if e.is_timeout() {
            format!("request timed out: {}", e)
        } else if e.is_connect() {
            format!("could not connect: {}", e)
        } else {
            format!("request failed: {}", e)
        };
        PipelineError::backend(backend, reason)
    })?;

    let status = response.status();
    trace!("{} backend response status: {}", backend, status);

    let text = response.text().await.map_err(|e| {
        PipelineError::backend(backend, format!("failed to read response body: {}", e))
    })?;

    if !status.is_success() {
        let (snippet, _) = truncate_chars(text.trim(), MAX_ERROR_BODY_CHARS);
        error!("{} backend error {}: {}", backend, status, snippet);
        return Err(PipelineError::backend(
            backend,
            format!("HTTP {}: {}", status, snippet),
        ));
    }

    serde_json::from_str(&text).map_err(|e| {
        PipelineError::backend(backend, format!("response is not valid JSON: {}", e))
    })
}
