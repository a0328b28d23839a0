//! Data-body parsing for `;`-header instrument reports.
//!
//! The body opens with a date anchor line (`YYYY DOY MM DD`) followed by one
//! row per sample: a 4-digit `HHMM` time code and one whitespace-separated
//! value per field. Rows are produced lazily so callers can stop early.

use crate::error::{HelioError, Result};
use crate::models::time_indexed_frame;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use polars::prelude::DataFrame;
use std::iter::Enumerate;
use std::str::Lines;
use tracing::{debug, warn};

/// Declared missing-value sentinel
#[derive(Debug, Clone, PartialEq)]
pub struct MissingValue {
    text: String,
    numeric: Option<f64>,
}

impl MissingValue {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let numeric = text.parse::<f64>().ok().filter(|value| value.is_finite());
        Self { text, numeric }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether a raw token denotes missing data.
    ///
    /// Matches the literal token, or any token with the same numeric value
    /// (`-1.00e+00` and `-1` are the same sentinel).
    pub fn matches(&self, token: &str) -> bool {
        if token == self.text {
            return true;
        }
        match self.numeric {
            Some(sentinel) => token.parse::<f64>().is_ok_and(|value| value == sentinel),
            None => false,
        }
    }
}

/// Parse the `YYYY DOY MM DD` anchor line into a calendar date
pub fn parse_date_anchor(line: &str, line_number: usize) -> Result<NaiveDate> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(HelioError::row(
            line_number,
            line,
            "date anchor needs 'YYYY DOY MM DD'",
        ));
    }

    let number = |index: usize, what: &str| -> Result<u32> {
        tokens[index]
            .parse::<u32>()
            .map_err(|_| HelioError::row(line_number, line, format!("invalid {}", what)))
    };

    let year = number(0, "year")?;
    let day_of_year = number(1, "day of year")?;
    let month = number(2, "month")?;
    let day = number(3, "day")?;

    let date = i32::try_from(year)
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, month, day))
        .ok_or_else(|| {
            HelioError::row(
                line_number,
                line,
                format!("{}-{:02}-{:02} is not a calendar date", year, month, day),
            )
        })?;

    if date.ordinal() != day_of_year {
        warn!(
            "Day of year {} disagrees with {} (ordinal {}), using month/day",
            day_of_year,
            date,
            date.ordinal()
        );
    }

    Ok(date)
}

/// Decode a 4-digit `HHMM` time code into an offset from midnight
pub fn decode_time_code(token: &str) -> Option<TimeDelta> {
    if token.len() != 4 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i64 = token[0..2].parse().ok()?;
    let minutes: i64 = token[2..4].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(TimeDelta::hours(hours) + TimeDelta::minutes(minutes))
}

/// How row tokens line up against the extracted field names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLayout {
    /// Every field is a data column; rows carry one extra leading time token
    DataOnly,
    /// The first field names the time-code column itself
    TimeFieldNamed,
}

/// One decoded body row
#[derive(Debug, Clone, PartialEq)]
pub struct BodyRow {
    /// 1-based line number in the source file
    pub line: usize,
    pub timestamp: NaiveDateTime,
    /// One value per data column; `None` is the no-data marker
    pub values: Vec<Option<f64>>,
}

/// Parser configuration for one body
#[derive(Debug, Clone)]
pub struct BodyParser<'a> {
    fields: &'a [String],
    missing: Option<MissingValue>,
}

impl<'a> BodyParser<'a> {
    pub fn new(fields: &'a [String], missing_value: Option<&str>) -> Self {
        Self {
            fields,
            missing: missing_value.map(MissingValue::new),
        }
    }

    /// Row iterator over `body`, whose first line is `first_line` (1-based).
    ///
    /// Consumes the date anchor line eagerly; rows are decoded on demand.
    pub fn rows<'t>(&self, body: &'t str, first_line: usize) -> Result<BodyRows<'t>>
    where
        'a: 't,
    {
        let mut lines = body.lines().enumerate();

        let (anchor, anchor_line) = loop {
            match lines.next() {
                Some((_, line)) if line.trim().is_empty() => continue,
                Some((index, line)) => break (line, first_line + index),
                None => return Err(HelioError::header("no date anchor line after header")),
            }
        };
        let date = parse_date_anchor(anchor, anchor_line)?;
        debug!("Date anchor {} from line {}", date, anchor_line);

        Ok(BodyRows {
            lines,
            first_line,
            midnight: date.and_time(NaiveTime::MIN),
            fields: self.fields,
            missing: self.missing.clone(),
            layout: None,
            finished: false,
        })
    }

    /// Decode the whole body into a time-indexed table
    pub fn parse_table(&self, body: &str, first_line: usize) -> Result<DataFrame> {
        let mut rows = self.rows(body, first_line)?;
        let mut timestamps = Vec::new();
        let mut columns: Vec<Vec<Option<f64>>> = Vec::new();

        for row in rows.by_ref() {
            let row = row?;
            if columns.is_empty() {
                columns = vec![Vec::new(); row.values.len()];
            }
            timestamps.push(row.timestamp);
            for (column, value) in columns.iter_mut().zip(row.values) {
                column.push(value);
            }
        }

        let names = rows.data_fields().to_vec();
        if columns.is_empty() {
            columns = vec![Vec::new(); names.len()];
        }

        debug!(
            "Parsed {} rows x {} columns",
            timestamps.len(),
            names.len()
        );
        time_indexed_frame(&timestamps, names.into_iter().zip(columns).collect())
    }
}

/// Lazily decoded body rows.
///
/// Yields one result per non-blank line and stops after the first error.
pub struct BodyRows<'t> {
    lines: Enumerate<Lines<'t>>,
    first_line: usize,
    midnight: NaiveDateTime,
    fields: &'t [String],
    missing: Option<MissingValue>,
    layout: Option<RowLayout>,
    finished: bool,
}

impl<'t> BodyRows<'t> {
    /// Layout fixed by the first row, if one has been read
    pub fn layout(&self) -> Option<RowLayout> {
        self.layout
    }

    /// Names of the data columns under the current layout
    pub fn data_fields(&self) -> &'t [String] {
        match self.layout {
            Some(RowLayout::TimeFieldNamed) => &self.fields[1..],
            _ => self.fields,
        }
    }

    fn layout_for(&self, token_count: usize) -> Option<RowLayout> {
        let fields = self.fields.len();
        match self.layout {
            Some(RowLayout::DataOnly) => (token_count == fields + 1).then_some(RowLayout::DataOnly),
            Some(RowLayout::TimeFieldNamed) => {
                (token_count == fields).then_some(RowLayout::TimeFieldNamed)
            }
            None if token_count == fields + 1 => Some(RowLayout::DataOnly),
            None if token_count == fields && fields >= 2 => Some(RowLayout::TimeFieldNamed),
            None => None,
        }
    }

    fn decode(&mut self, line_number: usize, line: &str) -> Result<BodyRow> {
        let tokens: Vec<&str> = line.split_whitespace().collect();

        let layout = self.layout_for(tokens.len()).ok_or_else(|| {
            HelioError::row(
                line_number,
                line,
                format!(
                    "{} tokens do not match {} field names plus a time code",
                    tokens.len(),
                    self.fields.len()
                ),
            )
        })?;
        if self.layout.is_none() {
            debug!("Row layout {:?} from line {}", layout, line_number);
            self.layout = Some(layout);
        }

        let offset = decode_time_code(tokens[0]).ok_or_else(|| {
            HelioError::row(
                line_number,
                line,
                format!("time code {:?} is not HHMM", tokens[0]),
            )
        })?;

        let values = tokens[1..]
            .iter()
            .map(|token| {
                if self.missing.as_ref().is_some_and(|missing| missing.matches(token)) {
                    return Ok(None);
                }
                token.parse::<f64>().map(Some).map_err(|_| {
                    HelioError::row(line_number, line, format!("non-numeric value {:?}", token))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BodyRow {
            line: line_number,
            timestamp: self.midnight + offset,
            values,
        })
    }
}

impl Iterator for BodyRows<'_> {
    type Item = Result<BodyRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        while let Some((index, line)) = self.lines.next() {
            if line.trim().is_empty() {
                continue;
            }
            let line_number = self.first_line + index;
            let row = self.decode(line_number, line);
            if row.is_err() {
                self.finished = true;
            }
            return Some(row);
        }

        self.finished = true;
        None
    }
}
