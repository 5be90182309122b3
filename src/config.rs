// src/config.rs
//! Run configuration, layered from lowest to highest precedence:
//! built-in defaults, an optional YAML file, environment variables, CLI flags.

use crate::backend::hosted::{DEFAULT_HOSTED_BASE_URL, DEFAULT_HOSTED_MODEL};
use crate::backend::local::DEFAULT_LOCAL_MODEL;
use crate::error::{PipelineError, Result};
use crate::posting::extractor::DEFAULT_MAX_TEXT_CHARS;
use crate::writer::CollisionPolicy;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_FILE: &str = "jobnote.yaml";
pub const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SETTLE_DELAY_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_NOTE_EXTENSION: &str = "md";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Hosted,
    Local,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" | "gemini" => Ok(BackendKind::Hosted),
            "local" => Ok(BackendKind::Local),
            other => Err(format!(
                "unknown backend '{}' (expected hosted or local)",
                other
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Hosted => f.write_str("hosted"),
            BackendKind::Local => f.write_str("local"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    /// Headless Chromium, renders JavaScript
    #[default]
    Browser,
    /// Plain HTTP GET
    Http,
}

impl FromStr for FetcherKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "browser" => Ok(FetcherKind::Browser),
            "http" => Ok(FetcherKind::Http),
            other => Err(format!(
                "unknown fetcher '{}' (expected browser or http)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStrategyKind {
    #[default]
    Selectors,
    LargestBlock,
}

impl FromStr for ContentStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "selectors" => Ok(ContentStrategyKind::Selectors),
            "largest_block" | "largest-block" => Ok(ContentStrategyKind::LargestBlock),
            other => Err(format!(
                "unknown content strategy '{}' (expected selectors or largest_block)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Hosted {
        api_key: String,
        model: String,
        base_url: String,
    },
    Local {
        base_url: String,
        api_key: Option<String>,
        model: String,
    },
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Hosted { .. } => BackendKind::Hosted,
            BackendConfig::Local { .. } => BackendKind::Local,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            BackendConfig::Hosted { model, .. } | BackendConfig::Local { model, .. } => model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub kind: FetcherKind,
    /// Bound on navigation, settle delay and capture together
    pub page_load_timeout: Duration,
    pub settle_delay: Duration,
    pub chrome_executable: Option<PathBuf>,
    pub headless: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            kind: FetcherKind::default(),
            page_load_timeout: Duration::from_secs(DEFAULT_PAGE_LOAD_TIMEOUT_SECS),
            settle_delay: Duration::from_secs(DEFAULT_SETTLE_DELAY_SECS),
            chrome_executable: None,
            headless: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOptions {
    pub max_text_chars: usize,
    pub format_pass: bool,
    pub request_timeout: Duration,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            format_pass: false,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextOptions {
    pub strategy: ContentStrategyKind,
    /// Replaces the built-in selector list when set
    pub content_selectors: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteOptions {
    pub extension: String,
    pub collision: CollisionPolicy,
    pub template_path: Option<PathBuf>,
}

impl Default for NoteOptions {
    fn default() -> Self {
        Self {
            extension: DEFAULT_NOTE_EXTENSION.to_string(),
            collision: CollisionPolicy::default(),
            template_path: None,
        }
    }
}

/// Fully resolved and validated configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub backend: BackendConfig,
    pub save_path: PathBuf,
    pub fetch: FetchOptions,
    pub extraction: ExtractionOptions,
    pub text: TextOptions,
    pub note: NoteOptions,
}

/// Connection settings of one backend in the YAML file. Each backend has its
/// own section so switching backends never reuses the other one's key or URL.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

/// YAML configuration file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub backend: Option<BackendKind>,
    pub hosted: BackendSection,
    pub local: BackendSection,
    pub save_path: Option<PathBuf>,
    pub fetcher: Option<FetcherKind>,
    pub page_load_timeout_secs: Option<u64>,
    pub settle_delay_secs: Option<u64>,
    pub chrome_path: Option<PathBuf>,
    pub headless: Option<bool>,
    pub max_text_chars: Option<usize>,
    pub format_pass: Option<bool>,
    pub request_timeout_secs: Option<u64>,
    pub content_strategy: Option<ContentStrategyKind>,
    pub content_selectors: Option<Vec<String>>,
    pub note_extension: Option<String>,
    pub collision: Option<CollisionPolicy>,
    pub template_path: Option<PathBuf>,
}

impl ConfigFile {
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document is a valid, empty configuration
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| PipelineError::Environment(format!("invalid configuration file: {}", e)))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Environment(format!(
                "failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content).map_err(|e| {
            PipelineError::Environment(format!("{} ({})", e, path.display()))
        })
    }
}

/// Values given on the command line. They win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub backend: Option<BackendKind>,
    pub save_path: Option<PathBuf>,
    pub fetcher: Option<FetcherKind>,
    pub collision: Option<CollisionPolicy>,
    pub format_pass: Option<bool>,
}

impl PipelineConfig {
    /// Resolve the configuration from the process environment.
    /// Call after `.env` has been loaded.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();

        let file = match locate_config_file(overrides.config_path.as_deref(), &env) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                ConfigFile::from_path(&path)?
            }
            None => {
                debug!("No configuration file found, using environment only");
                ConfigFile::default()
            }
        };

        Self::resolve(file, env, overrides)
    }

    /// Merge the layers and validate the result. `env` stands in for the
    /// process environment; empty values count as unset.
    pub fn resolve<F>(file: ConfigFile, env: F, overrides: &ConfigOverrides) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let backend_kind = overrides
            .backend
            .or(parse_env(&lookup, "JOBNOTE_BACKEND")?)
            .or(file.backend)
            .unwrap_or_default();

        let model_override = lookup("JOBNOTE_MODEL");

        let backend = match backend_kind {
            BackendKind::Hosted => {
                let section = file.hosted;
                let api_key = lookup("GEMINI_API_KEY").or(section.api_key).ok_or_else(|| {
                    PipelineError::Environment(
                        "GEMINI_API_KEY is not set; the hosted backend needs an API key"
                            .to_string(),
                    )
                })?;
                let base_url = section
                    .base_url
                    .unwrap_or_else(|| DEFAULT_HOSTED_BASE_URL.to_string());
                BackendConfig::Hosted {
                    api_key,
                    model: model_override
                        .or(section.model)
                        .unwrap_or_else(|| DEFAULT_HOSTED_MODEL.to_string()),
                    base_url: validate_base_url(base_url)?,
                }
            }
            BackendKind::Local => {
                let section = file.local;
                let base_url = lookup("LOCAL_LLM_BASE_URL").or(section.base_url).ok_or_else(|| {
                    PipelineError::Environment(
                        "LOCAL_LLM_BASE_URL is not set; the local backend needs an endpoint"
                            .to_string(),
                    )
                })?;
                BackendConfig::Local {
                    base_url: validate_base_url(base_url)?,
                    api_key: lookup("LOCAL_LLM_API_KEY").or(section.api_key),
                    model: model_override
                        .or(section.model)
                        .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string()),
                }
            }
        };

        let save_path = overrides
            .save_path
            .clone()
            .or_else(|| lookup("MARKDOWN_SAVE_PATH").map(PathBuf::from))
            .or(file.save_path)
            .ok_or_else(|| {
                PipelineError::Environment(
                    "MARKDOWN_SAVE_PATH is not set; no directory to save notes in".to_string(),
                )
            })?;

        let fetch = FetchOptions {
            kind: overrides
                .fetcher
                .or(parse_env(&lookup, "JOBNOTE_FETCHER")?)
                .or(file.fetcher)
                .unwrap_or_default(),
            page_load_timeout: Duration::from_secs(
                parse_env(&lookup, "JOBNOTE_FETCH_TIMEOUT_SECS")?
                    .or(file.page_load_timeout_secs)
                    .unwrap_or(DEFAULT_PAGE_LOAD_TIMEOUT_SECS),
            ),
            settle_delay: Duration::from_secs(
                parse_env(&lookup, "JOBNOTE_SETTLE_SECS")?
                    .or(file.settle_delay_secs)
                    .unwrap_or(DEFAULT_SETTLE_DELAY_SECS),
            ),
            chrome_executable: lookup("CHROME_PATH").map(PathBuf::from).or(file.chrome_path),
            headless: file.headless.unwrap_or(true),
        };
        if fetch.page_load_timeout.is_zero() {
            return Err(PipelineError::Environment(
                "page load timeout must be at least one second".to_string(),
            ));
        }
        if fetch.kind == FetcherKind::Browser && fetch.settle_delay >= fetch.page_load_timeout {
            return Err(PipelineError::Environment(format!(
                "settle delay ({}s) must be shorter than the page load timeout ({}s)",
                fetch.settle_delay.as_secs(),
                fetch.page_load_timeout.as_secs()
            )));
        }

        let max_text_chars = parse_env(&lookup, "JOBNOTE_MAX_TEXT_CHARS")?
            .or(file.max_text_chars)
            .unwrap_or(DEFAULT_MAX_TEXT_CHARS);
        if max_text_chars == 0 {
            return Err(PipelineError::Environment(
                "max_text_chars must be greater than zero".to_string(),
            ));
        }
        let format_pass = match overrides.format_pass {
            Some(enabled) => enabled,
            None => match lookup("JOBNOTE_FORMAT_PASS") {
                Some(raw) => parse_flag("JOBNOTE_FORMAT_PASS", &raw)?,
                None => file.format_pass.unwrap_or(false),
            },
        };
        let extraction = ExtractionOptions {
            max_text_chars,
            format_pass,
            request_timeout: Duration::from_secs(
                file.request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        };

        let text = TextOptions {
            strategy: file.content_strategy.unwrap_or_default(),
            content_selectors: file.content_selectors,
        };

        let extension = lookup("JOBNOTE_NOTE_EXTENSION")
            .or(file.note_extension)
            .unwrap_or_else(|| DEFAULT_NOTE_EXTENSION.to_string());
        let extension = extension.trim().trim_start_matches('.').to_string();
        if extension.is_empty() || extension.contains(['/', '\\']) {
            return Err(PipelineError::Environment(format!(
                "invalid note extension '{}'",
                extension
            )));
        }
        let note = NoteOptions {
            extension,
            collision: overrides
                .collision
                .or(parse_env(&lookup, "JOBNOTE_COLLISION")?)
                .or(file.collision)
                .unwrap_or_default(),
            template_path: file.template_path,
        };

        Ok(Self {
            backend,
            save_path,
            fetch,
            extraction,
            text,
            note,
        })
    }
}

/// `--config` first, then `JOBNOTE_CONFIG`, then `./jobnote.yaml` if present.
fn locate_config_file<F>(explicit: Option<&Path>, env: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env("JOBNOTE_CONFIG").filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    default.exists().then_some(default)
}

fn parse_env<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                PipelineError::Environment(format!("invalid value for {}: {}", key, e))
            })
        })
        .transpose()
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PipelineError::Environment(format!(
            "invalid value for {}: '{}' is not a boolean",
            key, other
        ))),
    }
}

fn validate_base_url(raw: String) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/').to_string();
    url::Url::parse(&trimmed).map_err(|e| {
        PipelineError::Environment(format!("invalid backend base URL '{}': {}", trimmed, e))
    })?;
    Ok(trimmed)
}
