// src/backend/local.rs
//! Local OpenAI-compatible endpoint (LM Studio, llama.cpp server, Ollama...).

use super::http::{build_client, post_json};
use super::{CompletionRequest, LanguageModel};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_LOCAL_MODEL: &str = "local-model";

const BACKEND_NAME: &str = "local";

pub struct LocalBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl LocalBackend {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(PipelineError::Environment(
                "local backend requires a base URL".to_string(),
            ));
        }

        Ok(Self {
            client: build_client(BACKEND_NAME, timeout)?,
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body(&self, request: &CompletionRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
        });
        if request.json_output {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait]
impl LanguageModel for LocalBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        info!("Sending request to local model at {}", self.base_url);

        let mut builder = self.client.post(self.endpoint());
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let json = post_json(builder, BACKEND_NAME, &self.build_body(request)).await?;

        let text = json["choices"]
            .as_array()
            .and_then(|choices| choices.first())
            .and_then(|choice| choice["message"]["content"].as_str())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::backend(BACKEND_NAME, "response contained no message content")
            })?
            .to_string();

        info!("Received {} characters from local model", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: Some("Output JSON only.".into()),
            prompt: "Posting text".into(),
            temperature: 0.1,
            json_output: true,
        }
    }

    fn chat_response(content: &str) -> Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    #[test]
    fn test_requires_base_url() {
        let timeout = Duration::from_secs(5);
        let err = LocalBackend::new(" ".into(), None, DEFAULT_LOCAL_MODEL.into(), timeout)
            .err()
            .unwrap();
        assert_eq!(err.stage(), Stage::Environment);
    }

    #[tokio::test]
    async fn test_complete_posts_chat_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "local-model",
                "messages": [
                    { "role": "system", "content": "Output JSON only." },
                    { "role": "user", "content": "Posting text" }
                ],
                "response_format": { "type": "json_object" }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_response("{\"role\":\"Dev\"}")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend = LocalBackend::new(
            format!("{}/v1/", server.uri()),
            None,
            DEFAULT_LOCAL_MODEL.into(),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(backend.complete(&request()).await.unwrap(), "{\"role\":\"Dev\"}");
    }

    #[tokio::test]
    async fn test_optional_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer lm-studio"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let backend = LocalBackend::new(
            server.uri(),
            Some("lm-studio".into()),
            DEFAULT_LOCAL_MODEL.into(),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(backend.complete(&request()).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_server_error_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let timeout = Duration::from_secs(5);
        let backend =
            LocalBackend::new(server.uri(), None, DEFAULT_LOCAL_MODEL.into(), timeout).unwrap();
        let err = backend.complete(&request()).await.unwrap_err();

        assert_eq!(err.stage(), Stage::Backend);
        assert!(err.to_string().contains("model not loaded"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let timeout = Duration::from_secs(5);
        let backend =
            LocalBackend::new(server.uri(), None, DEFAULT_LOCAL_MODEL.into(), timeout).unwrap();
        let err = backend.complete(&request()).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Backend);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_backend_error() {
        // Nothing listens on the discard port
        let backend = LocalBackend::new(
            "http://127.0.0.1:9".into(),
            None,
            DEFAULT_LOCAL_MODEL.into(),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = backend.complete(&request()).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Backend);
    }
}
