// src/error.rs
//! Error taxonomy for a pipeline run. Every variant aborts the run.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Environment,
    Fetch,
    Backend,
    Extraction,
    Write,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Environment => "environment",
            Stage::Fetch => "fetch",
            Stage::Backend => "backend",
            Stage::Extraction => "extraction",
            Stage::Write => "write",
        }
    }

    /// Process exit code used by the binary for failures in this stage.
    pub fn exit_code(&self) -> u8 {
        match self {
            Stage::Environment => 2,
            Stage::Fetch => 3,
            Stage::Backend => 4,
            Stage::Extraction => 5,
            Stage::Write => 6,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing configuration, or the browser could not be started.
    #[error("{0}")]
    Environment(String),

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("timed out after {seconds}s loading {url}")]
    FetchTimeout { url: String, seconds: u64 },

    #[error("{backend} backend request failed: {reason}")]
    Backend { backend: String, reason: String },

    /// The model response could not be turned into posting fields.
    #[error("{0}")]
    Extraction(String),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Environment(_) => Stage::Environment,
            PipelineError::Fetch { .. } | PipelineError::FetchTimeout { .. } => Stage::Fetch,
            PipelineError::Backend { .. } => Stage::Backend,
            PipelineError::Extraction(_) => Stage::Extraction,
            PipelineError::Io { .. } => Stage::Write,
        }
    }

    pub(crate) fn fetch(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        PipelineError::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn backend(backend: impl Into<String>, reason: impl fmt::Display) -> Self {
        PipelineError::Backend {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
