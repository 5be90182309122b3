// src/writer.rs
//! Persists rendered notes under the target directory.

use crate::error::{PipelineError, Result};
use crate::renderer::Note;
use crate::utils::sanitize_file_stem;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Highest numeric suffix tried before giving up under [`CollisionPolicy::Suffix`].
const MAX_SUFFIX: u32 = 999;

/// What to do when a note with the same file name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Keep the existing file and write `Name (2).md`, `Name (3).md`, ...
    #[default]
    Suffix,
    Overwrite,
    /// Fail the run with an IO error.
    Reject,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "suffix" => Ok(CollisionPolicy::Suffix),
            "overwrite" => Ok(CollisionPolicy::Overwrite),
            "reject" => Ok(CollisionPolicy::Reject),
            other => Err(format!(
                "unknown collision policy '{}', expected suffix, overwrite or reject",
                other
            )),
        }
    }
}

pub struct NoteWriter {
    target_dir: PathBuf,
    extension: String,
    collision: CollisionPolicy,
}

impl NoteWriter {
    pub fn new(target_dir: PathBuf, extension: &str, collision: CollisionPolicy) -> Self {
        Self {
            target_dir,
            extension: extension.trim().trim_start_matches('.').to_string(),
            collision,
        }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// File name a note with this stem gets, before collision handling
    pub fn file_name(&self, stem: &str) -> String {
        self.compose_name(&sanitize_file_stem(stem), None)
    }

    fn compose_name(&self, stem: &str, suffix: Option<u32>) -> String {
        let stem = match suffix {
            Some(n) => format!("{} ({})", stem, n),
            None => stem.to_string(),
        };
        if self.extension.is_empty() {
            stem
        } else {
            format!("{}.{}", stem, self.extension)
        }
    }

    /// Write the note and return the absolute path of the created file.
    ///
    /// The target directory is never created here; a missing directory is an
    /// IO failure.
    pub async fn write(&self, note: &Note) -> Result<PathBuf> {
        let dir = fs::canonicalize(&self.target_dir)
            .await
            .map_err(|e| PipelineError::io(&self.target_dir, e))?;

        let metadata = fs::metadata(&dir)
            .await
            .map_err(|e| PipelineError::io(&dir, e))?;
        if !metadata.is_dir() {
            return Err(PipelineError::io(
                &dir,
                std::io::Error::new(ErrorKind::Other, "target is not a directory"),
            ));
        }

        let stem = sanitize_file_stem(&note.stem);
        let path = match self.collision {
            CollisionPolicy::Overwrite => {
                let path = dir.join(self.compose_name(&stem, None));
                if fs::try_exists(&path).await.unwrap_or(false) {
                    warn!("Overwriting existing note: {}", path.display());
                }
                fs::write(&path, &note.content)
                    .await
                    .map_err(|e| PipelineError::io(&path, e))?;
                path
            }
            CollisionPolicy::Reject => {
                let path = dir.join(self.compose_name(&stem, None));
                create_new(&path, &note.content)
                    .await
                    .map_err(|e| PipelineError::io(&path, e))?;
                path
            }
            CollisionPolicy::Suffix => self.write_with_suffix(&dir, &stem, &note.content).await?,
        };

        info!("Written note: {}", path.display());
        Ok(path)
    }

    async fn write_with_suffix(&self, dir: &Path, stem: &str, content: &str) -> Result<PathBuf> {
        for n in 1..=MAX_SUFFIX {
            let suffix = if n == 1 { None } else { Some(n) };
            let path = dir.join(self.compose_name(stem, suffix));
            match create_new(&path, content).await {
                Ok(()) => return Ok(path),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("{} exists, trying next suffix", path.display());
                }
                Err(e) => return Err(PipelineError::io(path, e)),
            }
        }

        Err(PipelineError::io(
            dir.join(self.compose_name(stem, None)),
            std::io::Error::new(
                ErrorKind::AlreadyExists,
                format!("all {} suffixed names are taken", MAX_SUFFIX),
            ),
        ))
    }
}

async fn create_new(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
