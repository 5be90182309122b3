// src/posting/extractor.rs
use super::prompts::{extraction_prompt, formatting_prompt, EXTRACTION_SYSTEM, FORMATTING_SYSTEM};
use super::ExtractedPosting;
use crate::backend::{CompletionRequest, LanguageModel};
use crate::error::{PipelineError, Result};
use crate::utils::truncate_chars;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_TEXT_CHARS: usize = 15_000;

const EXTRACTION_TEMPERATURE: f32 = 0.1;
const FORMATTING_TEMPERATURE: f32 = 0.3;

pub struct StructuredExtractor {
    backend: Box<dyn LanguageModel>,
    max_text_chars: usize,
    format_pass: bool,
}

impl StructuredExtractor {
    pub fn new(backend: Box<dyn LanguageModel>) -> Self {
        Self {
            backend,
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            format_pass: false,
        }
    }

    pub fn with_max_text_chars(mut self, max_text_chars: usize) -> Self {
        self.max_text_chars = max_text_chars;
        self
    }

    /// Run a second request that only reformats the description
    pub fn with_format_pass(mut self, enabled: bool) -> Self {
        self.format_pass = enabled;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// One extraction request against the backend. No retries.
    pub async fn extract(&self, posting_text: &str, source_url: &str) -> Result<ExtractedPosting> {
        let (limited, truncated) = truncate_chars(posting_text, self.max_text_chars);
        if truncated {
            warn!(
                "Posting text truncated to {} characters before extraction",
                self.max_text_chars
            );
        }

        info!(
            "Extracting posting fields with {} backend (model {})",
            self.backend.name(),
            self.backend.model()
        );
        let request = CompletionRequest {
            system: Some(EXTRACTION_SYSTEM.to_string()),
            prompt: extraction_prompt(source_url, limited),
            temperature: EXTRACTION_TEMPERATURE,
            json_output: true,
        };
        let response = self.backend.complete(&request).await?;
        debug!("Raw extraction response: {}", response);

        let mut posting = parse_extraction(&response)?;
        info!(
            "Extracted posting: {} at {}",
            posting.role, posting.company
        );

        if self.format_pass && !posting.description.is_empty() {
            posting.description = self.format_description(&posting.description).await;
        }
        Ok(posting)
    }

    /// Formatting is cosmetic: any failure keeps the unformatted description.
    async fn format_description(&self, plain: &str) -> String {
        let (limited, _) = truncate_chars(plain, self.max_text_chars);
        let request = CompletionRequest {
            system: Some(FORMATTING_SYSTEM.to_string()),
            prompt: formatting_prompt(limited),
            temperature: FORMATTING_TEMPERATURE,
            json_output: false,
        };

        match self.backend.complete(&request).await {
            Ok(response) => {
                let formatted = strip_code_fence(response.trim());
                if formatted.chars().count() * 2 < plain.chars().count() {
                    warn!("Formatted description looks truncated, keeping the original");
                    plain.to_string()
                } else {
                    formatted.to_string()
                }
            }
            Err(e) => {
                warn!("Description formatting failed, keeping the original: {}", e);
                plain.to_string()
            }
        }
    }
}

/// Parse a backend response into posting fields.
///
/// Tolerates whitespace, code fences and prose around one JSON object, plus
/// the legacy keys `comp`, `req` and `link`. Anything else is an extraction
/// error; nothing is repaired.
pub fn parse_extraction(response: &str) -> Result<ExtractedPosting> {
    let json_text = isolate_json_object(response).ok_or_else(|| {
        PipelineError::Extraction("model response contains no JSON object".to_string())
    })?;

    let value: Value = serde_json::from_str(json_text).map_err(|e| {
        PipelineError::Extraction(format!("model response is not valid JSON: {}", e))
    })?;
    let object = value.as_object().ok_or_else(|| {
        PipelineError::Extraction("model response is not a JSON object".to_string())
    })?;

    let company = required_field(object, "company")?;
    let role = required_field(object, "role")?;

    let description = match object.get("description") {
        Some(Value::String(s)) => s.trim().to_string(),
        None | Some(Value::Null) => {
            warn!("Model response has no description");
            String::new()
        }
        Some(other) => {
            return Err(PipelineError::Extraction(format!(
                "field 'description' has unexpected type: {}",
                other
            )))
        }
    };

    Ok(ExtractedPosting {
        company,
        role,
        location: string_field(object, &["location"])?,
        compensation: string_field(object, &["compensation", "comp"])?,
        requisition_id: string_field(object, &["requisition_id", "req"])?,
        application_url: string_field(object, &["application_url", "link"])?,
        description,
    })
}

fn required_field(object: &Map<String, Value>, key: &str) -> Result<String> {
    string_field(object, &[key])?.ok_or_else(|| {
        PipelineError::Extraction(format!(
            "model response is missing required field '{}'",
            key
        ))
    })
}

/// First non-empty value among `keys`. Strings are trimmed and single-lined,
/// numbers are stringified, null and "" count as absent.
fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Result<Option<String>> {
    for key in keys {
        match object.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => {
                let value = crate::utils::collapse_whitespace(s);
                if !value.is_empty() {
                    return Ok(Some(value));
                }
            }
            Some(Value::Number(n)) => return Ok(Some(n.to_string())),
            Some(other) => {
                return Err(PipelineError::Extraction(format!(
                    "field '{}' has unexpected type: {}",
                    key, other
                )))
            }
        }
    }
    Ok(None)
}

fn isolate_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the info string, e.g. ```markdown
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}
