//! Configuration for batch ingestion.
//!
//! Single-file parsing needs no configuration; these settings only steer
//! directory discovery, worker concurrency and presentation.

use crate::display::DisplayConfig;
use crate::error::{HelioError, Result};
use crate::models::Source;
use serde::{Deserialize, Serialize};

/// File extensions picked up when walking directories
pub const DEFAULT_EXTENSIONS: &[&str] = &["txt", "csv", "fits", "fts", "fit"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Maximum number of files parsed at once
    pub max_concurrent_files: usize,

    /// Extensions (without dot, case-insensitive) accepted during discovery
    pub extensions: Vec<String>,

    /// Source hint applied to every file, e.g. "EVE"
    pub source_hint: Option<String>,

    /// Show a progress bar while ingesting
    pub show_progress: bool,

    pub display: DisplayConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: num_cpus::get(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            source_hint: None,
            show_progress: true,
            display: DisplayConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn with_max_concurrent_files(mut self, max_files: usize) -> Self {
        self.max_concurrent_files = max_files;
        self
    }

    pub fn with_source_hint(mut self, hint: impl Into<String>) -> Self {
        self.source_hint = Some(hint.into());
        self
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|ext| ext.to_string()).collect();
        self
    }

    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn with_time_format(mut self, time_format: impl Into<String>) -> Self {
        self.display.time_format = time_format.into();
        self
    }

    /// Whether a file extension is accepted during discovery
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(extension))
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_files == 0 {
            return Err(HelioError::Configuration {
                message: "max_concurrent_files must be at least 1".to_string(),
            });
        }
        if self.extensions.is_empty() {
            return Err(HelioError::Configuration {
                message: "at least one file extension is required".to_string(),
            });
        }
        if let Some(hint) = &self.source_hint {
            Source::from_hint(hint)?;
        }
        self.display.validate()
    }
}
