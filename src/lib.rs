//! Helio Timeseries Library
//!
//! Reads solar instrument data files into one canonical time-series record:
//! a time-indexed table, ordered header metadata, per-column physical units
//! and an optional nickname.
//!
//! Supported inputs:
//! - SDO/EVE level 0CS reports (`;` comment header, `HHMM` rows)
//! - SDO/EVE averages CSV files
//! - Nobeyama Radioheliograph correlation FITS files
//!
//! The format is detected from the first line of content, never from the
//! file name. Batch ingestion and Parquet export sit on top of the parsers.

pub mod body;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod export;
pub mod fits;
pub mod header;
pub mod models;
pub mod processor;
pub mod sources;
pub mod units;

// Re-export commonly used types
pub use config::IngestConfig;
pub use dispatch::{FileFormat, detect_format, read_file, read_from};
pub use display::{AxisScale, DisplayConfig, PlotSpec, plot_spec};
pub use error::{HelioError, Result};
pub use export::write_parquet;
pub use models::{IngestStats, Meta, MetaValue, Source, TIME_COLUMN, TimeSeriesRecord};
pub use processor::{BatchIngestor, FileOutcome};
pub use units::{ColumnUnits, Unit};
