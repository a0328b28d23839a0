//! Comment-header parsing for `;`-prefixed instrument reports.
//!
//! Splits the leading header block from the data body, transcribes the
//! header into ordered metadata (detecting the missing-value declaration),
//! and extracts the column names listed between the `Column descriptions:`
//! and `Format:` markers.

use crate::error::{HelioError, Result};
use crate::models::Meta;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Character that starts every header line
pub const HEADER_SENTINEL: char = ';';

/// Marker closing (usually) the column-name region
pub const FORMAT_MARKER: &str = "Format:";

/// Marker opening (usually) the column-name region
pub const COLUMN_MARKER: &str = "Column descriptions:";

static MISSING_DATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Missing data\s*:\s*(.*?)\s*$").expect("valid regex"));

/// Leading header lines of a file, sentinel included, line endings removed
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderBlock<'a> {
    lines: Vec<&'a str>,
}

impl<'a> HeaderBlock<'a> {
    pub fn lines(&self) -> &[&'a str] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Header line text with the sentinel and surrounding whitespace removed
    fn contents(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.lines.iter().map(|line| strip_sentinel(line))
    }
}

/// Split `text` into its header block and the body that follows.
///
/// The body slice starts exactly at the first line that does not begin with
/// the header sentinel, so the body parser sees that line first.
pub fn lex_header(text: &str) -> (HeaderBlock<'_>, &str) {
    let mut lines = Vec::new();
    let mut offset = 0;

    for raw in text.split_inclusive('\n') {
        if !raw.starts_with(HEADER_SENTINEL) {
            break;
        }
        lines.push(raw.trim_end_matches(['\n', '\r']));
        offset += raw.len();
    }

    debug!("Lexed {} header lines", lines.len());
    (HeaderBlock { lines }, &text[offset..])
}

/// Metadata transcribed from a header block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMetadata {
    pub meta: Meta,
    /// Declared missing-value sentinel, if any
    pub missing_value: Option<String>,
}

/// Transcribe every key/value header line into ordered metadata.
///
/// The `Missing data:` declaration is looked for on every line. Structural
/// markers are left out. Keys and values are split on the first `:` so that
/// values containing the delimiter (creation timestamps, URLs) stay intact.
pub fn extract_metadata(header: &HeaderBlock<'_>) -> HeaderMetadata {
    let mut result = HeaderMetadata::default();

    for content in header.contents() {
        if content.is_empty() || structural_marker(content).is_some() {
            continue;
        }

        if let Some(captures) = MISSING_DATA.captures(content) {
            let value = captures[1].to_string();
            if value.is_empty() {
                debug!("Ignoring empty missing-data declaration");
            } else {
                debug!("Missing data sentinel declared: {}", value);
                result.missing_value = Some(value);
            }
        }

        let Some((key, value)) = content.split_once(':') else {
            debug!("Skipping header line without key/value delimiter: {}", content);
            continue;
        };

        let key = normalize_key(key);
        if key.is_empty() {
            debug!("Skipping header line with empty key: {}", content);
            continue;
        }

        let value = value.trim();
        if value.contains(':') {
            debug!("Header value for '{}' contains ':', kept whole", key);
        }
        result.meta.insert(key, value);
    }

    result
}

/// Extract the ordered column names from the marker-delimited region.
///
/// The region opens at whichever marker appears first and closes at the
/// other one; both must be present and the region must name at least one
/// column.
pub fn extract_field_names(header: &HeaderBlock<'_>) -> Result<Vec<String>> {
    let mut opened_by: Option<&str> = None;
    let mut closed = false;
    let mut fields = Vec::new();

    for content in header.contents() {
        match (opened_by, structural_marker(content)) {
            (None, Some(marker)) => opened_by = Some(marker),
            (None, None) => {}
            (Some(open), Some(marker)) if marker != open => {
                closed = true;
                break;
            }
            (Some(_), Some(_)) => {}
            (Some(_), None) => {
                if content.is_empty() {
                    continue;
                }
                let name = content
                    .split_once(':')
                    .map_or(content, |(name, _)| name)
                    .trim();
                if !name.is_empty() {
                    fields.push(name.to_string());
                }
            }
        }
    }

    match opened_by {
        None => Err(HelioError::header(format!(
            "no '{}' / '{}' column-name block",
            COLUMN_MARKER, FORMAT_MARKER
        ))),
        Some(open) if !closed => Err(HelioError::header(format!(
            "column-name block opened by '{}' is never closed",
            open
        ))),
        Some(_) if fields.is_empty() => {
            Err(HelioError::header("column-name block lists no columns"))
        }
        Some(_) => {
            debug!("Extracted {} field names", fields.len());
            Ok(fields)
        }
    }
}

/// The structural marker a header line starts with, if any.
///
/// Text after the marker (e.g. `Format: (I4, F10.3)`) does not make the
/// line a key/value pair.
fn structural_marker(content: &str) -> Option<&'static str> {
    [COLUMN_MARKER, FORMAT_MARKER]
        .into_iter()
        .find(|marker| content.starts_with(marker))
}

fn strip_sentinel(line: &str) -> &str {
    line.trim_start()
        .trim_start_matches(HEADER_SENTINEL)
        .trim()
}

/// Trim whitespace and strip leading punctuation from a metadata key
fn normalize_key(key: &str) -> String {
    key.trim_start_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "\
; Title: EVE Level 0CS diodes
; Source: SDO/EVE: LASP
; Created: Tue Jan 15 00:05:12 2013
; Missing data: -1.00e+00
; Column descriptions:
; XRS-B proxy: GOES XRS-B proxy from ESP
;   17.1ESP: ESP 17.1 nm channel
; darkESP: ESP dark counts
; Format:
; free form text without delimiter
2013 015 01 15
0000 1.0 2.0 3.0
";

    #[test]
    fn test_lex_stops_at_first_body_line() {
        let (header, body) = lex_header(HEADER);
        assert_eq!(header.len(), 10);
        assert!(body.starts_with("2013 015 01 15\n"));
        assert_eq!(header.lines()[0], "; Title: EVE Level 0CS diodes");
    }

    #[test]
    fn test_lex_handles_crlf_and_headerless_input() {
        let (header, body) = lex_header("; a: 1\r\n; b: 2\r\n2013 015 01 15\r\n");
        assert_eq!(header.lines(), &["; a: 1", "; b: 2"]);
        assert_eq!(body, "2013 015 01 15\r\n");

        let (header, body) = lex_header("2013 015 01 15\n");
        assert!(header.is_empty());
        assert_eq!(body, "2013 015 01 15\n");
    }

    #[test]
    fn test_metadata_order_and_first_colon_split() {
        let (header, _) = lex_header(HEADER);
        let metadata = extract_metadata(&header);

        let keys: Vec<&str> = metadata.meta.keys().collect();
        assert_eq!(
            keys,
            vec![
                "Title",
                "Source",
                "Created",
                "Missing data",
                "XRS-B proxy",
                "17.1ESP",
                "darkESP",
            ]
        );
        assert_eq!(metadata.meta.get_str("Source"), Some("SDO/EVE: LASP"));
        assert_eq!(
            metadata.meta.get_str("Created"),
            Some("Tue Jan 15 00:05:12 2013")
        );
        assert_eq!(metadata.missing_value.as_deref(), Some("-1.00e+00"));
    }

    #[test]
    fn test_markers_excluded_from_meta() {
        let (header, _) = lex_header(HEADER);
        let metadata = extract_metadata(&header);
        assert!(!metadata.meta.contains_key("Format"));
        assert!(!metadata.meta.contains_key("Column descriptions"));
    }

    #[test]
    fn test_marker_with_trailing_text_is_not_meta() {
        let (header, _) = lex_header("; Column descriptions:\n; a: x\n; Format: (I4, F10.3)\n");

        assert_eq!(extract_field_names(&header).unwrap(), vec!["a"]);
        let metadata = extract_metadata(&header);
        let keys: Vec<&str> = metadata.meta.keys().collect();
        assert_eq!(keys, vec!["a"]);
    }

    #[test]
    fn test_missing_data_detected_anywhere() {
        let (header, _) = lex_header("; Column descriptions:\n; a:\n; Format:\n; Missing data: -99\n");
        let metadata = extract_metadata(&header);
        assert_eq!(metadata.missing_value.as_deref(), Some("-99"));
    }

    #[test]
    fn test_no_missing_data_declaration() {
        let (header, _) = lex_header("; Title: x\n");
        assert_eq!(extract_metadata(&header).missing_value, None);
    }

    #[test]
    fn test_field_names_between_markers() {
        let (header, _) = lex_header(HEADER);
        let fields = extract_field_names(&header).unwrap();
        assert_eq!(fields, vec!["XRS-B proxy", "17.1ESP", "darkESP"]);
    }

    #[test]
    fn test_field_names_with_reversed_markers() {
        let (header, _) = lex_header("; Format:\n; a: first\n; b\n; Column descriptions:\n");
        assert_eq!(extract_field_names(&header).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_markers_are_fatal() {
        let (header, _) = lex_header("; Title: x\n; Format:\n");
        assert!(matches!(
            extract_field_names(&header),
            Err(HelioError::HeaderMalformed { .. })
        ));

        let (header, _) = lex_header("; Title: x\n");
        assert!(matches!(
            extract_field_names(&header),
            Err(HelioError::HeaderMalformed { .. })
        ));

        let (header, _) = lex_header("; Column descriptions:\n; Format:\n");
        assert!(matches!(
            extract_field_names(&header),
            Err(HelioError::HeaderMalformed { .. })
        ));
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  ;; Source "), "Source");
        assert_eq!(normalize_key("- Created"), "Created");
    }
}
