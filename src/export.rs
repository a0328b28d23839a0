//! Parquet export of record tables.

use crate::error::{HelioError, Result};
use crate::models::TimeSeriesRecord;
use polars::prelude::{ParquetCompression, ParquetWriter, StatisticsOptions};
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Write the record's table (time index included) to a Snappy-compressed
/// Parquet file, returning the number of rows written.
pub fn write_parquet(record: &TimeSeriesRecord, output_path: &Path) -> Result<usize> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut frame = record.data().clone();
    let file = File::create(output_path)?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .with_statistics(StatisticsOptions::full())
        .finish(&mut frame)
        .map_err(|e| HelioError::ProcessingFailed {
            path: output_path.to_path_buf(),
            reason: format!("failed to write parquet: {}", e),
        })?;

    info!(
        "Wrote {} rows x {} columns to {}",
        frame.height(),
        frame.width(),
        output_path.display()
    );
    Ok(frame.height())
}
