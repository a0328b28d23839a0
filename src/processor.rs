//! Batch ingestion of many instrument files.
//!
//! Each file is parsed independently on a blocking worker task; a failure
//! is reported for that file only and never affects the other records.

use crate::config::IngestConfig;
use crate::dispatch::read_file;
use crate::error::{HelioError, Result};
use crate::models::{IngestStats, TimeSeriesRecord};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Result of ingesting one file
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<TimeSeriesRecord>,
}

/// Parses batches of files with bounded concurrency
#[derive(Debug, Clone)]
pub struct BatchIngestor {
    config: IngestConfig,
}

impl BatchIngestor {
    pub fn new(config: IngestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Expand inputs into files: directories are walked recursively and
    /// filtered by extension, plain files are taken as given.
    pub fn discover(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for input in inputs {
            if !input.exists() {
                return Err(HelioError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("input not found: {}", input.display()),
                )));
            }

            if input.is_file() {
                files.push(input.clone());
                continue;
            }

            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!("Skipping unreadable entry under {}: {}", input.display(), e);
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| self.has_accepted_extension(path))
                .collect();
            found.sort();

            debug!("Discovered {} files under {}", found.len(), input.display());
            files.extend(found);
        }

        Ok(files)
    }

    /// Parse every file; outcomes are returned in input order
    pub async fn ingest(&self, files: &[PathBuf]) -> (Vec<FileOutcome>, IngestStats) {
        let start_time = Instant::now();
        let progress = self.progress_bar(files.len());
        let concurrency = self.config.max_concurrent_files.min(files.len()).max(1);

        let mut outcomes: Vec<(usize, FileOutcome)> = stream::iter(files.iter().cloned().enumerate())
            .map(|(index, path)| {
                let hint = self.config.source_hint.clone();
                let progress = progress.clone();
                async move {
                    if let Some(file_name) = path.file_name() {
                        progress.set_message(format!("Parsing: {}", file_name.to_string_lossy()));
                    }

                    let worker_path = path.clone();
                    let result = task::spawn_blocking(move || read_file(&worker_path, hint.as_deref()))
                        .await
                        .unwrap_or_else(|e| {
                            Err(HelioError::ProcessingFailed {
                                path: path.clone(),
                                reason: format!("parse task failed: {}", e),
                            })
                        });
                    progress.inc(1);

                    (index, FileOutcome { path, result })
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        progress.finish_with_message("All files parsed");
        outcomes.sort_by_key(|(index, _)| *index);

        let mut stats = IngestStats::default();
        for (_, outcome) in &outcomes {
            match &outcome.result {
                Ok(record) => {
                    stats.files_parsed += 1;
                    stats.total_rows += record.len();
                    debug!("Parsed {} ({} rows)", outcome.path.display(), record.len());
                }
                Err(e) => {
                    stats.files_failed += 1;
                    error!("Failed to parse {}: {}", outcome.path.display(), e);
                }
            }
        }
        stats.processing_time_ms = start_time.elapsed().as_millis();

        (outcomes.into_iter().map(|(_, outcome)| outcome).collect(), stats)
    }

    fn has_accepted_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.config.accepts_extension(ext))
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        progress.set_style(style);
        progress
    }
}
