//! Default plot presentation derived from a record.
//!
//! Rendering lives elsewhere; this module only decides titles, labels and
//! per-column axis modes from the record's source, columns and metadata.

use crate::error::{HelioError, Result};
use crate::models::{Source, TimeSeriesRecord};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Presentation settings passed in by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// strftime-style format for timestamps in labels
    pub time_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

impl DisplayConfig {
    /// Reject a `time_format` containing unknown strftime specifiers
    pub fn validate(&self) -> Result<()> {
        if StrftimeItems::new(&self.time_format).any(|item| matches!(item, Item::Error)) {
            return Err(self.invalid_time_format());
        }
        Ok(())
    }

    fn invalid_time_format(&self) -> HelioError {
        HelioError::Configuration {
            message: format!("invalid time_format {:?}", self.time_format),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AxisScale {
    Linear,
    Log,
}

/// How one column is drawn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStyle {
    pub column: String,
    pub label: String,
    pub y_scale: AxisScale,
    pub y_range: Option<(f64, f64)>,
}

/// Everything a plotting collaborator needs besides the data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSpec {
    pub title: String,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub series: Vec<SeriesStyle>,
}

/// Build the default plot presentation for a record.
///
/// With `column` set, only that column is described.
pub fn plot_spec(
    record: &TimeSeriesRecord,
    column: Option<&str>,
    config: &DisplayConfig,
) -> Result<PlotSpec> {
    let columns = match column {
        Some(column) if record.column_names().iter().any(|name| name == column) => {
            vec![column.to_string()]
        }
        Some(column) => {
            return Err(HelioError::Configuration {
                message: format!("record has no column '{}'", column),
            });
        }
        None => record.column_names(),
    };

    match record.source() {
        Source::Eve => Ok(eve_plot(record, column, columns)),
        Source::Norh => norh_plot(record, columns, config),
    }
}

fn eve_plot(record: &TimeSeriesRecord, column: Option<&str>, columns: Vec<String>) -> PlotSpec {
    let title = match column {
        Some(column) => format!("EVE {}", column.replace('_', " ")),
        None if columns.len() > 1 => "EVE (1 minute data)".to_string(),
        None => match record.filename() {
            Some(filename) => title_from_filename(filename),
            None => "EVE Averages".to_string(),
        },
    };

    PlotSpec {
        title,
        x_label: None,
        y_label: None,
        series: columns
            .into_iter()
            .map(|column| SeriesStyle {
                label: column.clone(),
                column,
                y_scale: AxisScale::Linear,
                y_range: None,
            })
            .collect(),
    }
}

fn norh_plot(
    record: &TimeSeriesRecord,
    columns: Vec<String>,
    config: &DisplayConfig,
) -> Result<PlotSpec> {
    let frequency_label = record.meta().get_str("OBS-FREQ").map(frequency_label);

    config.validate()?;
    let x_label = match record.timestamps()?.first() {
        Some(start) => {
            let mut label = String::from("Start time: ");
            write!(label, "{}", start.format(&config.time_format))
                .map_err(|_| config.invalid_time_format())?;
            Some(label)
        }
        None => None,
    };

    Ok(PlotSpec {
        title: "Nobeyama Radioheliograph".to_string(),
        x_label,
        y_label: Some("Correlation".to_string()),
        series: columns
            .into_iter()
            .map(|column| SeriesStyle {
                label: frequency_label.clone().unwrap_or_else(|| column.clone()),
                column,
                y_scale: AxisScale::Log,
                y_range: Some((1e-4, 1.0)),
            })
            .collect(),
    })
}

/// `17GHZ` → `17 GHZ`
fn frequency_label(frequency: &str) -> String {
    let value: String = frequency.chars().take(2).collect();
    let unit: String = frequency.chars().skip(2).take(3).collect();
    format!("{} {}", value, unit).trim_end().to_string()
}

/// `EVE_L0CS_1m.txt` → `EVE L0CS 1m`
fn title_from_filename(filename: &str) -> String {
    let spaced = filename.replace('_', " ");
    match spaced.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => spaced,
    }
}
