//! Format detection and parser dispatch.
//!
//! A file's first line is matched against an ordered table of format rules
//! (first match wins); the winning format owns the file. Source hints from
//! the caller are checked against the detected format's source.

use crate::error::{HelioError, Result};
use crate::fits;
use crate::models::{Source, TimeSeriesRecord};
use crate::sources::{eve, norh};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info};

/// Upper bound on bytes examined when peeking the first line
const PEEK_LIMIT: u64 = 4096;

/// File formats with a registered parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FileFormat {
    /// EVE averages CSV, first line starts with `Date`
    EveAverages,
    /// EVE level 0CS report with a `;` comment header
    EveLevel0cs,
    /// NoRH correlation light curve, FITS primary array
    NorhFits,
}

impl FileFormat {
    /// Source that owns this format
    pub fn source(&self) -> Source {
        match self {
            FileFormat::EveAverages | FileFormat::EveLevel0cs => Source::Eve,
            FileFormat::NorhFits => Source::Norh,
        }
    }

    /// Run this format's parser over the raw file bytes
    pub fn parse(&self, bytes: &[u8], filename: Option<&str>) -> Result<TimeSeriesRecord> {
        match self {
            FileFormat::EveAverages => eve::parse_averages(decode_text(bytes)?, filename),
            FileFormat::EveLevel0cs => eve::parse_level_0cs(decode_text(bytes)?, filename),
            FileFormat::NorhFits => norh::parse_fits(bytes, filename),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileFormat::EveAverages => "EVE averages CSV",
            FileFormat::EveLevel0cs => "EVE level 0CS",
            FileFormat::NorhFits => "NoRH FITS",
        };
        f.write_str(name)
    }
}

/// One detection rule: a first-line predicate and the format it selects
struct FormatRule {
    matches: fn(&str) -> bool,
    format: FileFormat,
}

fn starts_with_date(line: &str) -> bool {
    line.starts_with("Date")
}

fn starts_with_comment(line: &str) -> bool {
    line.starts_with(';')
}

fn starts_with_fits_card(line: &str) -> bool {
    fits::is_fits(line.as_bytes())
}

/// Ordered detection rules, evaluated top to bottom
const FORMAT_RULES: &[FormatRule] = &[
    FormatRule {
        matches: starts_with_date,
        format: FileFormat::EveAverages,
    },
    FormatRule {
        matches: starts_with_comment,
        format: FileFormat::EveLevel0cs,
    },
    FormatRule {
        matches: starts_with_fits_card,
        format: FileFormat::NorhFits,
    },
];

/// Classify a file by its first line
pub fn detect_format(first_line: &str) -> Result<FileFormat> {
    FORMAT_RULES
        .iter()
        .find(|rule| (rule.matches)(first_line))
        .map(|rule| rule.format)
        .ok_or_else(|| HelioError::UnrecognizedFormat {
            path: Default::default(),
            leading: first_line.chars().take(16).collect(),
        })
}

/// Read the first line without moving the reader.
///
/// The stream position is restored before returning, so the caller still
/// sees the whole file. At most [`PEEK_LIMIT`] bytes are examined.
pub fn peek_first_line<R: BufRead + Seek>(reader: &mut R) -> std::io::Result<String> {
    let start = reader.stream_position()?;
    let mut line = Vec::new();
    reader.by_ref().take(PEEK_LIMIT).read_until(b'\n', &mut line)?;
    reader.seek(SeekFrom::Start(start))?;

    Ok(String::from_utf8_lossy(&line)
        .trim_end_matches(['\r', '\n'])
        .to_string())
}

/// Check a caller-supplied source hint against the detected format
pub fn check_hint(format: FileFormat, hint: Option<&str>) -> Result<()> {
    let Some(hint) = hint else {
        return Ok(());
    };
    // Unknown hints are reported as such rather than as a mismatch
    Source::from_hint(hint)?;
    if format.source().is_datasource_for(hint) {
        Ok(())
    } else {
        Err(HelioError::SourceMismatch {
            path: Default::default(),
            hint: hint.to_string(),
            detected: format.source().to_string(),
        })
    }
}

/// Detect and parse a seekable stream
pub fn read_from<R: BufRead + Seek>(
    reader: &mut R,
    filename: Option<&str>,
    hint: Option<&str>,
) -> Result<TimeSeriesRecord> {
    let format = detect_stream(reader, hint)?;

    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    debug!("Read {} bytes", bytes.len());

    format.parse(&bytes, filename)
}

/// Detect and parse a file on disk
pub fn read_file(path: &Path, hint: Option<&str>) -> Result<TimeSeriesRecord> {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    let parse = || -> Result<TimeSeriesRecord> {
        let mut reader = BufReader::new(File::open(path)?);
        match detect_stream(&mut reader, hint)? {
            // cfitsio reads the file itself
            FileFormat::NorhFits => norh::read_fits_file(path, filename.as_deref()),
            format => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                debug!("Read {} bytes", bytes.len());
                format.parse(&bytes, filename.as_deref())
            }
        }
    };
    parse().map_err(|e| e.with_path(path))
}

/// Peek, classify and check the hint without consuming the stream
fn detect_stream<R: BufRead + Seek>(reader: &mut R, hint: Option<&str>) -> Result<FileFormat> {
    let first_line = peek_first_line(reader)?;
    let format = detect_format(&first_line)?;
    check_hint(format, hint)?;
    info!("Detected {} ({})", format, format.source());
    Ok(format)
}

/// Decode file bytes as text, once, before any header or body scanning
fn decode_text(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| HelioError::InvalidEncoding {
        path: Default::default(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_prefix_rules() {
        assert_eq!(
            detect_format("Date,XRS-B,XRS-A").unwrap(),
            FileFormat::EveAverages
        );
        assert_eq!(
            detect_format("; Title: EVE").unwrap(),
            FileFormat::EveLevel0cs
        );
        assert_eq!(
            detect_format("SIMPLE  =                    T").unwrap(),
            FileFormat::NorhFits
        );
        assert!(matches!(
            detect_format("# comment"),
            Err(HelioError::UnrecognizedFormat { .. })
        ));
        assert!(detect_format("").is_err());
    }

    #[test]
    fn test_peek_restores_position() {
        let mut reader = Cursor::new(b"first line\r\nsecond line\n".to_vec());
        reader.seek(SeekFrom::Start(6)).unwrap();

        let line = peek_first_line(&mut reader).unwrap();
        assert_eq!(line, "line");
        assert_eq!(reader.stream_position().unwrap(), 6);

        reader.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(peek_first_line(&mut reader).unwrap(), "first line");
        assert_eq!(reader.stream_position().unwrap(), 0);
    }

    #[test]
    fn test_hint_checks() {
        assert!(check_hint(FileFormat::EveLevel0cs, None).is_ok());
        assert!(check_hint(FileFormat::EveLevel0cs, Some("EVE")).is_ok());
        assert!(check_hint(FileFormat::NorhFits, Some("NoRH")).is_ok());
        assert!(matches!(
            check_hint(FileFormat::NorhFits, Some("EVE")),
            Err(HelioError::SourceMismatch { .. })
        ));
        assert!(matches!(
            check_hint(FileFormat::EveAverages, Some("GOES")),
            Err(HelioError::UnknownSource { .. })
        ));
    }

    #[test]
    fn test_unrecognized_stream_is_not_parsed() {
        let mut reader = Cursor::new(b"garbage\n".to_vec());
        let result = read_from(&mut reader, None, None);
        assert!(matches!(result, Err(HelioError::UnrecognizedFormat { .. })));
    }

    #[test]
    fn test_invalid_utf8_text_format() {
        let result = FileFormat::EveLevel0cs.parse(&[b';', 0xff, b'\n'], None);
        assert!(matches!(result, Err(HelioError::InvalidEncoding { .. })));
    }
}
