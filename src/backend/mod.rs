// src/backend/mod.rs
//! Language-model backends. Both variants satisfy the same one-shot
//! request/response contract and differ only in transport and auth.

use crate::config::BackendConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

mod http;
pub mod hosted;
pub mod local;

pub use hosted::HostedBackend;
pub use local::LocalBackend;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    /// Ask the backend to constrain its output to a JSON object
    pub json_output: bool,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short label used in logs and error messages
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Send one request and return the raw response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Build the backend selected by the configuration
pub fn from_config(config: &BackendConfig, timeout: Duration) -> Result<Box<dyn LanguageModel>> {
    match config {
        BackendConfig::Hosted {
            api_key,
            model,
            base_url,
        } => Ok(Box::new(HostedBackend::new(
            api_key.clone(),
            model.clone(),
            base_url.clone(),
            timeout,
        )?)),
        BackendConfig::Local {
            base_url,
            api_key,
            model,
        } => Ok(Box::new(LocalBackend::new(
            base_url.clone(),
            api_key.clone(),
            model.clone(),
            timeout,
        )?)),
    }
}
