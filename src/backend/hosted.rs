// src/backend/hosted.rs
//! Hosted Gemini API, authenticated with an API key.

use super::http::{build_client, post_json};
use super::{CompletionRequest, LanguageModel};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_HOSTED_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_HOSTED_MODEL: &str = "gemini-1.5-flash";

const BACKEND_NAME: &str = "hosted";

pub struct HostedBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl HostedBackend {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(PipelineError::Environment(
                "hosted backend requires an API key".to_string(),
            ));
        }

        Ok(Self {
            client: build_client(BACKEND_NAME, timeout)?,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn build_body(request: &CompletionRequest) -> Value {
        let mut generation_config = json!({ "temperature": request.temperature });
        if request.json_output {
            generation_config["responseMimeType"] = json!("application/json");
        }

        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }],
            "generationConfig": generation_config,
        });

        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }

    fn response_text(json: &Value) -> Result<String> {
        let parts = json["candidates"]
            .as_array()
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate["content"]["parts"].as_array());

        let text: String = parts
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = json["promptFeedback"]["blockReason"]
                .as_str()
                .map(|r| format!("prompt was blocked: {}", r))
                .unwrap_or_else(|| "response contained no text".to_string());
            return Err(PipelineError::backend(BACKEND_NAME, reason));
        }
        Ok(text)
    }
}

#[async_trait]
impl LanguageModel for HostedBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        info!("Sending request to hosted model {}", self.model);

        let builder = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key);
        let json = post_json(builder, BACKEND_NAME, &Self::build_body(request)).await?;

        let text = Self::response_text(&json)?;
        info!("Received {} characters from hosted model", text.len());
        Ok(text)
    }
}
