//! SDO/EVE light curves.
//!
//! Two text layouts are supported: the level 0CS one-minute broadband report
//! (`;` comment header, `HHMM` rows) and the plain averages CSV whose first
//! column is the date index.

use crate::body::BodyParser;
use crate::error::{HelioError, Result};
use crate::header::{extract_field_names, extract_metadata, lex_header};
use crate::models::{Meta, Source, TIME_COLUMN, TimeSeriesRecord};
use crate::sources::nickname_from_filename;
use crate::units::{EVE_UNITS, UnitRegistry};
use polars::prelude::*;
use std::io::Cursor;
use tracing::{debug, info};

/// Parse a level 0CS report
pub fn parse_level_0cs(text: &str, filename: Option<&str>) -> Result<TimeSeriesRecord> {
    let (header, body) = lex_header(text);
    if header.is_empty() {
        return Err(HelioError::header("level 0CS file has no ';' header"));
    }

    let metadata = extract_metadata(&header);
    let fields = extract_field_names(&header)?;
    info!(
        "EVE level 0CS header: {} lines, {} meta entries, {} fields, missing value {:?}",
        header.len(),
        metadata.meta.len(),
        fields.len(),
        metadata.missing_value
    );

    let parser = BodyParser::new(&fields, metadata.missing_value.as_deref());
    let table = parser.parse_table(body, header.len() + 1)?;

    finish(table, metadata.meta, &EVE_UNITS, filename)
}

/// Parse an averages CSV: comma-separated, one header row, date index first.
///
/// The remaining columns are kept as read. There is no key/value header, so
/// the record has empty metadata and dimensionless units.
pub fn parse_averages(text: &str, filename: Option<&str>) -> Result<TimeSeriesRecord> {
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .map_parse_options(|options| options.with_try_parse_dates(true))
        .into_reader_with_file_handle(Cursor::new(text.as_bytes().to_vec()))
        .finish()?;

    let mut columns = frame.get_columns().to_vec();
    if columns.is_empty() {
        return Err(HelioError::header("averages CSV has no columns"));
    }

    let index = columns.remove(0);
    let index_name = index.name().to_string();
    let index = index
        .as_materialized_series()
        .strict_cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .map_err(|e| {
            HelioError::header(format!(
                "index column '{}' is not a date/time column: {}",
                index_name, e
            ))
        })?
        .with_name(TIME_COLUMN.into())
        .into_column();

    debug!(
        "EVE averages: index '{}', {} data columns, {} rows",
        index_name,
        columns.len(),
        frame.height()
    );

    columns.insert(0, index);
    let table = DataFrame::new(columns)?;

    finish(table, Meta::new(), &UnitRegistry::empty(), filename)
}

fn finish(
    table: DataFrame,
    meta: Meta,
    registry: &UnitRegistry,
    filename: Option<&str>,
) -> Result<TimeSeriesRecord> {
    let record = TimeSeriesRecord::assemble(Source::Eve, table, meta, registry)?
        .with_nickname(nickname_from_filename(filename));

    Ok(match filename {
        Some(filename) => record.with_filename(filename),
        None => record,
    })
}
