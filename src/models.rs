//! Core data structures for the canonical time-series record.
//!
//! Defines the supported sources, the ordered metadata mapping, the
//! record every parser produces, and batch ingestion statistics.

use crate::error::{HelioError, Result};
use crate::units::{ColumnUnits, Unit, UnitRegistry};
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Name of the timestamp index column in every record table
pub const TIME_COLUMN: &str = "time";

/// Instrument sources with a registered parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// SDO Extreme ultraviolet Variability Experiment
    Eve,
    /// Nobeyama Radioheliograph
    Norh,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Eve, Source::Norh];

    /// Canonical short code used for hint matching
    pub fn short_name(&self) -> &'static str {
        match self {
            Source::Eve => "EVE",
            Source::Norh => "NoRH",
        }
    }

    /// Whether a caller-supplied source hint selects this source.
    ///
    /// Case-sensitive prefix match: "EVE", "EVE_L0CS" select EVE, "eve" does not.
    pub fn is_datasource_for(&self, hint: &str) -> bool {
        hint.starts_with(self.short_name())
    }

    /// Resolve a hint against every known source
    pub fn from_hint(hint: &str) -> Result<Source> {
        Source::ALL
            .into_iter()
            .find(|source| source.is_datasource_for(hint))
            .ok_or_else(|| HelioError::UnknownSource {
                hint: hint.to_string(),
            })
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A metadata value as transcribed from a file header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Logical(bool),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Numeric view of integer, float or numeric-looking text values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Integer(value) => Some(*value as f64),
            MetaValue::Float(value) => Some(*value),
            MetaValue::Text(text) => text.trim().parse().ok(),
            MetaValue::Logical(_) => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Text(text) => f.write_str(text),
            MetaValue::Integer(value) => write!(f, "{}", value),
            MetaValue::Float(value) => write!(f, "{}", value),
            MetaValue::Logical(value) => f.write_str(if *value { "T" } else { "F" }),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Text(value)
    }
}

/// Ordered header metadata.
///
/// Entries keep file order and duplicates are retained; lookups return the
/// first declaration of a key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    entries: Vec<(String, MetaValue)>,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, keeping any earlier entry with the same key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Replace the first entry for `key`, or append when absent
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetaValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Meta {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// The canonical output of every source parser.
///
/// `data` holds the [`TIME_COLUMN`] index first, followed by one column per
/// data field in declaration order. Records are immutable once assembled.
#[derive(Debug, Clone)]
pub struct TimeSeriesRecord {
    source: Source,
    data: DataFrame,
    meta: Meta,
    units: ColumnUnits,
    filename: Option<String>,
    nickname: Option<String>,
}

impl TimeSeriesRecord {
    /// Assemble a record, deriving units for every data column from `registry`
    pub fn assemble(
        source: Source,
        data: DataFrame,
        meta: Meta,
        registry: &UnitRegistry,
    ) -> Result<Self> {
        let first = data.get_column_names().first().map(|name| name.to_string());
        if first.as_deref() != Some(TIME_COLUMN) {
            return Err(HelioError::RecordInvalid {
                reason: format!(
                    "record table must start with the '{}' column, found {:?}",
                    TIME_COLUMN, first
                ),
            });
        }

        let units = registry.resolve(
            data.get_column_names()
                .into_iter()
                .skip(1)
                .map(|name| name.as_str()),
        );

        Ok(Self {
            source,
            data,
            meta,
            units,
            filename: None,
            nickname: None,
        })
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_nickname(mut self, nickname: Option<String>) -> Self {
        self.nickname = nickname.filter(|name| !name.is_empty());
        self
    }

    pub fn source(&self) -> Source {
        self.source
    }

    /// Full table, index column included
    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn units(&self) -> &ColumnUnits {
        &self.units
    }

    pub fn unit(&self, column: &str) -> Unit {
        self.units.get(column)
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    /// Data column names, index excluded
    pub fn column_names(&self) -> Vec<String> {
        self.data
            .get_column_names()
            .into_iter()
            .skip(1)
            .map(|name| name.to_string())
            .collect()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.data.height()
    }

    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    /// Row timestamps in table order
    pub fn timestamps(&self) -> Result<Vec<NaiveDateTime>> {
        let millis = self
            .data
            .column(TIME_COLUMN)?
            .as_materialized_series()
            .cast(&DataType::Int64)?;

        millis
            .i64()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value
                    .and_then(DateTime::from_timestamp_millis)
                    .map(|timestamp| timestamp.naive_utc())
                    .ok_or_else(|| HelioError::RecordInvalid {
                        reason: format!("row {} has no valid timestamp", row),
                    })
            })
            .collect()
    }

    /// Values of one data column; `None` is the no-data marker
    pub fn values(&self, column: &str) -> Result<Vec<Option<f64>>> {
        let series = self
            .data
            .column(column)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        Ok(series.f64()?.into_iter().collect())
    }
}

/// Build a time-indexed table from timestamps and float columns
pub fn time_indexed_frame(
    timestamps: &[NaiveDateTime],
    columns: Vec<(String, Vec<Option<f64>>)>,
) -> Result<DataFrame> {
    let millis: Vec<i64> = timestamps
        .iter()
        .map(|timestamp| timestamp.and_utc().timestamp_millis())
        .collect();

    let index = Series::new(TIME_COLUMN.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

    let mut frame_columns = Vec::with_capacity(columns.len() + 1);
    frame_columns.push(index.into_column());
    for (name, values) in columns {
        frame_columns.push(Series::new(name.as_str().into(), values).into_column());
    }

    Ok(DataFrame::new(frame_columns)?)
}

/// Batch ingestion statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestStats {
    pub files_parsed: usize,
    pub files_failed: usize,
    pub total_rows: usize,
    pub processing_time_ms: u128,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::EVE_UNITS;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 1, 15)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_source_hint_matching() {
        assert!(Source::Eve.is_datasource_for("EVE"));
        assert!(Source::Eve.is_datasource_for("EVE_L0CS"));
        assert!(!Source::Eve.is_datasource_for("eve"));
        assert!(Source::Norh.is_datasource_for("NoRH"));
        assert!(!Source::Norh.is_datasource_for("NORH"));
        assert_eq!(Source::from_hint("NoRH 17GHz").unwrap(), Source::Norh);
        assert!(matches!(
            Source::from_hint("GOES"),
            Err(HelioError::UnknownSource { .. })
        ));
    }

    #[test]
    fn test_meta_keeps_order_and_first_wins() {
        let mut meta = Meta::new();
        meta.insert("Source", "SDO/EVE");
        meta.insert("Created", "Tue Jan 15");
        meta.insert("Source", "duplicate");

        let keys: Vec<&str> = meta.keys().collect();
        assert_eq!(keys, vec!["Source", "Created", "Source"]);
        assert_eq!(meta.get_str("Source"), Some("SDO/EVE"));

        meta.set("Created", "Wed Jan 16");
        assert_eq!(meta.get_str("Created"), Some("Wed Jan 16"));
        assert_eq!(meta.len(), 3);
    }

    #[test]
    fn test_meta_serializes_in_order() {
        let mut meta = Meta::new();
        meta.insert("b", "1");
        meta.insert("a", MetaValue::Integer(2));
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"b":"1","a":2}"#);
    }

    #[test]
    fn test_record_assembly_and_accessors() {
        let frame = time_indexed_frame(
            &[at(0, 0), at(0, 1)],
            vec![
                ("17.1ESP".to_string(), vec![Some(1.5), None]),
                ("extra".to_string(), vec![Some(2.0), Some(3.0)]),
            ],
        )
        .unwrap();

        let record =
            TimeSeriesRecord::assemble(Source::Eve, frame, Meta::new(), &EVE_UNITS).unwrap();

        assert_eq!(record.len(), 2);
        assert_eq!(record.column_names(), vec!["17.1ESP", "extra"]);
        assert_eq!(record.unit("17.1ESP"), Unit::WattPerSquareMetre);
        assert_eq!(record.unit("extra"), Unit::Dimensionless);
        assert!(record.units().contains("extra"));
        assert_eq!(record.timestamps().unwrap(), vec![at(0, 0), at(0, 1)]);
        assert_eq!(record.values("17.1ESP").unwrap(), vec![Some(1.5), None]);
    }

    #[test]
    fn test_record_requires_time_index() {
        let frame = DataFrame::new(vec![
            Series::new("value".into(), vec![1.0f64]).into_column(),
        ])
        .unwrap();
        let result = TimeSeriesRecord::assemble(Source::Eve, frame, Meta::new(), &EVE_UNITS);
        assert!(matches!(result, Err(HelioError::RecordInvalid { .. })));
    }

    #[test]
    fn test_null_timestamp_is_invalid_record() {
        let index = Series::new(TIME_COLUMN.into(), vec![Some(0i64), None])
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        let frame = DataFrame::new(vec![
            index.into_column(),
            Series::new("value".into(), vec![1.0f64, 2.0]).into_column(),
        ])
        .unwrap();

        let record =
            TimeSeriesRecord::assemble(Source::Eve, frame, Meta::new(), &EVE_UNITS).unwrap();
        match record.timestamps() {
            Err(HelioError::RecordInvalid { reason }) => assert!(reason.contains("row 1")),
            other => panic!("expected RecordInvalid, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_nickname_is_dropped() {
        let frame = time_indexed_frame(&[], vec![]).unwrap();
        let record = TimeSeriesRecord::assemble(Source::Norh, frame, Meta::new(), &EVE_UNITS)
            .unwrap()
            .with_nickname(Some(String::new()));
        assert_eq!(record.nickname(), None);
        assert!(record.is_empty());
    }
}
