// src/pipeline.rs
//! Fetch, extract text, extract fields, render, write. Strictly linear: the
//! first failing stage ends the run and nothing after it executes.

use crate::backend;
use crate::config::{ContentStrategyKind, PipelineConfig, TextOptions};
use crate::error::{PipelineError, Result};
use crate::fetcher::{self, parse_url, PageFetcher};
use crate::page_text::{ContentStrategy, LargestBlockStrategy, SelectorStrategy, TextExtractor};
use crate::posting::{PostingFields, StatusFlags, StructuredExtractor};
use crate::renderer::NoteRenderer;
use crate::writer::NoteWriter;
use chrono::{Local, NaiveDate};
use std::path::PathBuf;
use tracing::{info, instrument};

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct WrittenNote {
    pub path: PathBuf,
    pub fields: PostingFields,
}

pub struct Pipeline {
    fetcher: Box<dyn PageFetcher>,
    text_extractor: TextExtractor,
    extractor: StructuredExtractor,
    renderer: NoteRenderer,
    writer: NoteWriter,
    applied: bool,
}

impl Pipeline {
    pub fn new(
        fetcher: Box<dyn PageFetcher>,
        text_extractor: TextExtractor,
        extractor: StructuredExtractor,
        renderer: NoteRenderer,
        writer: NoteWriter,
    ) -> Self {
        Self {
            fetcher,
            text_extractor,
            extractor,
            renderer,
            writer,
            applied: true,
        }
    }

    /// Record the posting as applied to on the run date (the default) or not.
    pub fn mark_applied(mut self, applied: bool) -> Self {
        self.applied = applied;
        self
    }

    /// Build every component from a validated configuration. Performs no
    /// network activity.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let fetcher = fetcher::from_options(&config.fetch)?;
        let text_extractor = TextExtractor::new(content_strategy(&config.text)?);

        let model = backend::from_config(&config.backend, config.extraction.request_timeout)?;
        let extractor = StructuredExtractor::new(model)
            .with_max_text_chars(config.extraction.max_text_chars)
            .with_format_pass(config.extraction.format_pass);

        let renderer = match &config.note.template_path {
            Some(path) => NoteRenderer::from_file(path)?,
            None => NoteRenderer::default(),
        };
        let writer = NoteWriter::new(
            config.save_path.clone(),
            &config.note.extension,
            config.note.collision,
        );

        info!(
            "Pipeline ready: {} fetcher, {} backend ({}), saving to {}",
            fetcher.name(),
            extractor.backend_name(),
            config.backend.model(),
            writer.target_dir().display()
        );
        Ok(Self::new(fetcher, text_extractor, extractor, renderer, writer))
    }

    pub async fn run(&self, raw_url: &str) -> Result<WrittenNote> {
        self.run_on(raw_url, Local::now().date_naive()).await
    }

    /// Run with an explicit date for `date_applied`.
    #[instrument(skip(self, today), fields(url = %raw_url.trim()))]
    pub async fn run_on(&self, raw_url: &str, today: NaiveDate) -> Result<WrittenNote> {
        let url = parse_url(raw_url)?;

        let page = self.fetcher.fetch(&url).await?;

        let text = self.text_extractor.extract(&page.html);
        info!("Extracted {} characters of posting text", text.chars().count());

        let posting = self.extractor.extract(&text, url.as_str()).await?;

        let status = if self.applied {
            StatusFlags::applied_on(today)
        } else {
            StatusFlags::not_applied()
        };
        let (fields, description) = posting.into_fields(url.as_str(), status);
        let note = self.renderer.render(&fields, &description);

        let path = self.writer.write(&note).await?;
        info!("Saved note for {} at {}", fields.company, path.display());

        Ok(WrittenNote { path, fields })
    }
}

fn content_strategy(options: &TextOptions) -> Result<Box<dyn ContentStrategy>> {
    match options.strategy {
        ContentStrategyKind::Selectors => match &options.content_selectors {
            Some(selectors) => Ok(Box::new(
                SelectorStrategy::with_selectors(selectors.iter().cloned())
                    .map_err(PipelineError::Environment)?,
            )),
            None => Ok(Box::new(SelectorStrategy::default())),
        },
        ContentStrategyKind::LargestBlock => Ok(Box::new(LargestBlockStrategy)),
    }
}
