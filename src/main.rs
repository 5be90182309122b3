use anyhow::{Context, Result};
use clap::Parser;
use job_notes::config::{BackendKind, ConfigOverrides, FetcherKind, PipelineConfig};
use job_notes::writer::CollisionPolicy;
use job_notes::{Pipeline, PipelineError};
use std::error::Error as _;
use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "jobnote")]
#[command(about = "Save a job posting as a Markdown note")]
#[command(version)]
struct Cli {
    /// Job posting URL. Prompted for when omitted.
    url: Option<String>,

    /// Language model backend: hosted or local
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Directory the note is written to
    #[arg(long, value_name = "DIR")]
    save_path: Option<PathBuf>,

    /// Page fetcher: browser or http
    #[arg(long)]
    fetcher: Option<FetcherKind>,

    /// What to do when the note file already exists: suffix, overwrite or reject
    #[arg(long)]
    collision: Option<CollisionPolicy>,

    /// Run a second request that reformats the description as Markdown
    #[arg(long)]
    format_pass: bool,

    /// Record the posting as not yet applied to
    #[arg(long)]
    not_applied: bool,

    /// YAML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_path: self.config.clone(),
            backend: self.backend,
            save_path: self.save_path.clone(),
            fetcher: self.fetcher,
            collision: self.collision,
            format_pass: self.format_pass.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    if let Err(e) = init_logging() {
        eprintln!("error: {:#}", e);
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();

    // Configuration problems are reported before asking for input
    let pipeline = match build_pipeline(&cli) {
        Ok(pipeline) => pipeline,
        Err(e) => return report_failure(&e),
    };

    let url = match cli.url.clone() {
        Some(url) => url,
        None => match prompt_for_url() {
            Ok(url) => url,
            Err(e) => {
                eprintln!("error: {:#}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    info!("Processing {}", url.trim());
    match pipeline.run(&url).await {
        Ok(written) => {
            println!("{}", written.path.display());
            ExitCode::SUCCESS
        }
        Err(e) => report_failure(&e),
    }
}

fn build_pipeline(cli: &Cli) -> Result<Pipeline, PipelineError> {
    let config = PipelineConfig::load(&cli.overrides())?;
    Ok(Pipeline::from_config(&config)?.mark_applied(!cli.not_applied))
}

fn report_failure(e: &PipelineError) -> ExitCode {
    let stage = e.stage();
    error!("Run failed in {} stage: {}", stage, e);
    eprintln!("error [{}]: {}", stage, e);
    let mut source = e.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
    ExitCode::from(stage.exit_code())
}

/// Console logging on stderr, plus JSON lines in `JOBNOTE_LOG_FILE` when set.
fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match std::env::var("JOBNOTE_LOG_FILE") {
        Ok(path) if !path.trim().is_empty() => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true) // Clear file on startup
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(file)
                    .with_current_span(false)
                    .with_span_list(false),
            )
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}

fn prompt_for_url() -> Result<String> {
    eprint!("Job posting URL: ");
    io::stderr().flush().context("Failed to flush prompt")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read URL from stdin")?;

    Ok(line.trim().to_string())
}
