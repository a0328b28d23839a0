//! Instrument-specific parsers.
//!
//! Each parser turns the raw content of one file into a
//! [`TimeSeriesRecord`](crate::models::TimeSeriesRecord).

pub mod eve;
pub mod norh;

/// File stem used as a record nickname
pub(crate) fn nickname_from_filename(filename: Option<&str>) -> Option<String> {
    let filename = filename?;
    let stem = std::path::Path::new(filename).file_stem()?.to_string_lossy();
    Some(stem.into_owned()).filter(|stem| !stem.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nickname_from_filename() {
        assert_eq!(
            nickname_from_filename(Some("EVE_L0CS_DIODES_1m.txt")).as_deref(),
            Some("EVE_L0CS_DIODES_1m")
        );
        assert_eq!(nickname_from_filename(None), None);
    }
}
