//! Command-line interface components.

use crate::config::IngestConfig;
use crate::dispatch::read_file;
use crate::display::{DisplayConfig, plot_spec};
use crate::export::write_parquet;
use crate::models::{Meta, TimeSeriesRecord};
use crate::processor::{BatchIngestor, FileOutcome};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "helio-ts")]
#[command(about = "Read solar instrument files (SDO/EVE, NoRH) into time-series tables")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse files or directories and summarise each record
    Inspect {
        /// Files or directories to read
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Source hint, e.g. "EVE" or "NoRH"
        #[arg(short, long)]
        source: Option<String>,

        /// Print summaries as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Maximum number of files parsed at once
        #[arg(long)]
        max_concurrent: Option<usize>,
    },

    /// Parse one file and write its table to Parquet
    Convert {
        /// File to read
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Output Parquet file
        #[arg(short, long)]
        output: PathBuf,

        /// Source hint, e.g. "EVE" or "NoRH"
        #[arg(short, long)]
        source: Option<String>,
    },
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "warn" }
    }
}

/// Set up structured logging on stderr
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("helio_timeseries={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    debug!("Logging initialized at level: {}", log_level);
}

/// Run the selected subcommand
pub async fn run(args: Args) -> Result<()> {
    init_tracing(args.get_log_level());

    match args.command {
        Command::Inspect {
            paths,
            source,
            json,
            max_concurrent,
        } => {
            let mut config = IngestConfig::default();
            if let Some(hint) = source {
                config = config.with_source_hint(hint);
            }
            if let Some(max_files) = max_concurrent {
                config = config.with_max_concurrent_files(max_files);
            }
            if json {
                config = config.without_progress();
            }
            inspect(&paths, config, json).await
        }
        Command::Convert {
            path,
            output,
            source,
        } => convert(&path, &output, source.as_deref()),
    }
}

async fn inspect(paths: &[PathBuf], config: IngestConfig, json: bool) -> Result<()> {
    let display = config.display.clone();
    let ingestor = BatchIngestor::new(config).context("Invalid ingest configuration")?;
    let files = ingestor
        .discover(paths)
        .context("Failed to discover input files")?;
    if files.is_empty() {
        anyhow::bail!("No instrument files found in the given paths");
    }

    let (outcomes, stats) = ingestor.ingest(&files).await;

    if json {
        let summaries: Vec<FileSummary> = outcomes
            .iter()
            .map(|outcome| FileSummary::from_outcome(outcome, &display))
            .collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for outcome in &outcomes {
            print_outcome(outcome, &display);
        }
        println!(
            "{} {} parsed, {} failed, {} rows in {} ms",
            "Summary:".bright_green().bold(),
            stats.files_parsed,
            stats.files_failed,
            stats.total_rows,
            stats.processing_time_ms
        );
    }

    if stats.files_parsed == 0 {
        anyhow::bail!("None of the {} files could be parsed", stats.files_failed);
    }
    Ok(())
}

fn convert(path: &Path, output: &Path, hint: Option<&str>) -> Result<()> {
    let record = read_file(path, hint).with_context(|| format!("Failed to read {}", path.display()))?;
    let rows = write_parquet(&record, output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} {} rows from {} ({}) to {}",
        "Wrote".bright_green().bold(),
        rows,
        path.display(),
        record.source(),
        output.display()
    );
    Ok(())
}

fn print_outcome(outcome: &FileOutcome, display: &DisplayConfig) {
    println!("{}", outcome.path.display().to_string().bright_cyan().bold());

    let record = match &outcome.result {
        Ok(record) => record,
        Err(e) => {
            println!("  {} {}", "error:".bright_red().bold(), e);
            return;
        }
    };

    println!("  source:   {}", record.source());
    if let Some(nickname) = record.nickname() {
        println!("  nickname: {}", nickname);
    }
    println!("  rows:     {}", record.len());
    println!("  columns:");
    for name in record.column_names() {
        println!("    {} [{}]", name, record.unit(&name).to_string().bright_black());
    }
    println!("  meta:     {} entries", record.meta().len());
    match plot_spec(record, None, display) {
        Ok(spec) => println!("  title:    {}", spec.title),
        Err(e) => println!("  {} {}", "plot:".yellow(), e),
    }
}

#[derive(Debug, Serialize)]
struct ColumnSummary {
    name: String,
    unit: String,
}

#[derive(Debug, Serialize)]
struct FileSummary<'a> {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nickname: Option<&'a str>,
    rows: usize,
    columns: Vec<ColumnSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<&'a Meta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

impl<'a> FileSummary<'a> {
    fn from_outcome(outcome: &'a FileOutcome, display: &DisplayConfig) -> Self {
        let path = outcome.path.display().to_string();
        match &outcome.result {
            Ok(record) => Self::from_record(path, record, display),
            Err(e) => Self {
                path,
                error: Some(e.to_string()),
                source: None,
                nickname: None,
                rows: 0,
                columns: Vec::new(),
                meta: None,
                title: None,
            },
        }
    }

    fn from_record(path: String, record: &'a TimeSeriesRecord, display: &DisplayConfig) -> Self {
        Self {
            path,
            error: None,
            source: Some(record.source().to_string()),
            nickname: record.nickname(),
            rows: record.len(),
            columns: record
                .column_names()
                .into_iter()
                .map(|name| ColumnSummary {
                    unit: record.unit(&name).to_string(),
                    name,
                })
                .collect(),
            meta: Some(record.meta()),
            title: plot_spec(record, None, display).ok().map(|spec| spec.title),
        }
    }
}
