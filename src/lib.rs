// src/lib.rs
//! Turns a job posting URL into a Markdown note with a YAML front matter
//! header, using a language model to pull out the structured fields.

pub mod backend;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod page_text;
pub mod pipeline;
pub mod posting;
pub mod renderer;
pub mod utils;
pub mod writer;

pub use config::{ConfigOverrides, PipelineConfig};
pub use error::{PipelineError, Result, Stage};
pub use pipeline::{Pipeline, WrittenNote};
