//! Nobeyama Radioheliograph correlation light curves.
//!
//! The primary FITS array holds one correlation value per sample. There is
//! no time column: the index is rebuilt from the observation start
//! (`DATE-OBS` + `CRVAL1`) and the sample cadence in seconds (`CDELT1`).

use crate::error::{HelioError, Result};
use crate::fits::{PrimaryHdu, read_primary_hdu, read_primary_hdu_file};
use crate::models::{Meta, MetaValue, Source, TimeSeriesRecord, time_indexed_frame};
use crate::units::NORH_UNITS;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::path::Path;
use tracing::{debug, info};

/// Name of the single data column
pub const CORRELATION_COLUMN: &str = "Correlation Coefficient";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%y", "%Y/%m/%d"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];

/// Parse NoRH `tca`/`tcz` correlation FITS content
pub fn parse_fits(bytes: &[u8], filename: Option<&str>) -> Result<TimeSeriesRecord> {
    record_from_hdu(read_primary_hdu(bytes)?, filename)
}

/// Parse a NoRH correlation FITS file on disk
pub fn read_fits_file(path: &Path, filename: Option<&str>) -> Result<TimeSeriesRecord> {
    record_from_hdu(read_primary_hdu_file(path)?, filename)
}

fn record_from_hdu(hdu: PrimaryHdu, filename: Option<&str>) -> Result<TimeSeriesRecord> {
    let mut meta = hdu.header;

    let start = observation_start(&meta)?;
    let cadence = cadence_seconds(&meta)?;
    let timestamps = sample_times(start, cadence, hdu.data.len())?;

    info!(
        "NoRH light curve: {} samples from {} every {}s",
        timestamps.len(),
        start,
        cadence
    );

    let table = time_indexed_frame(
        &timestamps,
        vec![(CORRELATION_COLUMN.to_string(), hdu.data)],
    )?;

    meta.set("detector", "");
    let nickname = meta.get_str("detector").map(str::to_string);

    let record =
        TimeSeriesRecord::assemble(Source::Norh, table, meta, &NORH_UNITS)?.with_nickname(nickname);
    Ok(match filename {
        Some(filename) => record.with_filename(filename),
        None => record,
    })
}

/// Observation start from `DATE-OBS` and `CRVAL1`.
///
/// `CRVAL1` is either a time-of-day string or seconds after midnight.
fn observation_start(meta: &Meta) -> Result<NaiveDateTime> {
    let date_text = meta
        .get_str("DATE-OBS")
        .ok_or_else(|| HelioError::fits("missing DATE-OBS"))?;

    // Some headers carry the full timestamp in DATE-OBS already
    if let Ok(timestamp) = NaiveDateTime::parse_from_str(date_text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(timestamp);
    }

    let date = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_text.trim(), format).ok())
        .ok_or_else(|| HelioError::fits(format!("unparseable DATE-OBS {:?}", date_text)))?;

    let time = match meta.get("CRVAL1") {
        Some(MetaValue::Text(text)) => TIME_FORMATS
            .iter()
            .find_map(|format| NaiveTime::parse_from_str(text.trim(), format).ok())
            .ok_or_else(|| HelioError::fits(format!("unparseable CRVAL1 {:?}", text)))?,
        Some(value) => {
            let seconds = value
                .as_f64()
                .filter(|seconds| seconds.is_finite() && (0.0..86_400.0).contains(seconds))
                .ok_or_else(|| HelioError::fits(format!("CRVAL1 {} is not a time of day", value)))?;
            NaiveTime::MIN + TimeDelta::microseconds((seconds * 1e6).round() as i64)
        }
        None => return Err(HelioError::fits("missing CRVAL1")),
    };

    Ok(date.and_time(time))
}

/// Sample spacing in seconds; must be finite and strictly positive
fn cadence_seconds(meta: &Meta) -> Result<f64> {
    let value = meta
        .get("CDELT1")
        .ok_or_else(|| HelioError::cadence("missing CDELT1"))?;
    let cadence = value
        .as_f64()
        .ok_or_else(|| HelioError::cadence(format!("CDELT1 {} is not numeric", value)))?;

    if !cadence.is_finite() || cadence <= 0.0 {
        return Err(HelioError::cadence(format!(
            "CDELT1 must be a positive number of seconds, found {}",
            cadence
        )));
    }
    Ok(cadence)
}

/// Timestamps `start + i * cadence` for `count` samples
fn sample_times(start: NaiveDateTime, cadence: f64, count: usize) -> Result<Vec<NaiveDateTime>> {
    debug!("Building {} sample times at {}s cadence", count, cadence);
    (0..count)
        .map(|index| {
            let offset = (index as f64 * cadence * 1e6).round();
            if !offset.is_finite() || offset > i64::MAX as f64 {
                return Err(HelioError::cadence(format!(
                    "sample {} lies beyond the representable time range",
                    index
                )));
            }
            start
                .checked_add_signed(TimeDelta::microseconds(offset as i64))
                .ok_or_else(|| {
                    HelioError::cadence(format!(
                        "sample {} lies beyond the representable time range",
                        index
                    ))
                })
        })
        .collect()
}
