//! Primary HDU access for FITS light-curve files.
//!
//! Files are opened through `fitsio` (bundled cfitsio). Only what
//! single-array light curves need is read: the primary header, transcribed
//! in card order with typed values, and a one-dimensional data array with
//! `BSCALE`/`BZERO` scaling applied by cfitsio.

use crate::error::{HelioError, Result};
use crate::models::{Meta, MetaValue};
use fitsio::FitsFile;
use fitsio::hdu::FitsHdu;
use std::ffi::{CStr, c_char, c_int};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// FITS logical record length
pub const BLOCK_SIZE: usize = 2880;

/// Length of one header card
pub const CARD_SIZE: usize = 80;

/// Keywords whose text is commentary rather than a `= value` pair
const COMMENTARY_KEYWORDS: &[&str] = &["COMMENT", "HISTORY"];

/// Buffer length for keyword, value and comment strings returned by cfitsio
const FIELD_BUFFER: usize = CARD_SIZE + 1;

/// Decoded primary HDU
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryHdu {
    /// Header cards in file order
    pub header: Meta,
    /// Physical values; `None` where the raw value is `BLANK` or not finite
    pub data: Vec<Option<f64>>,
}

/// Whether `bytes` begins with a FITS primary header card
pub fn is_fits(bytes: &[u8]) -> bool {
    bytes.len() >= 10 && bytes.starts_with(b"SIMPLE  =")
}

/// Read the primary HDU of in-memory FITS content.
///
/// cfitsio works on files, so the bytes are spilled to a temporary file
/// that is removed once the HDU has been read.
pub fn read_primary_hdu(bytes: &[u8]) -> Result<PrimaryHdu> {
    if !is_fits(bytes) {
        return Err(HelioError::fits("missing SIMPLE card"));
    }

    let mut spill = NamedTempFile::new()?;
    spill.write_all(bytes)?;
    spill.flush()?;
    read_primary_hdu_file(spill.path())
}

/// Read the primary header and its 1-D data array from a file on disk
pub fn read_primary_hdu_file(path: &Path) -> Result<PrimaryHdu> {
    let file_len = std::fs::metadata(path)?.len();

    let mut fits_file = FitsFile::open(path)?;
    let hdu = fits_file.primary_hdu()?;
    let header = read_header(&mut fits_file, &hdu)?;

    if header.get("SIMPLE") != Some(&MetaValue::Logical(true)) {
        return Err(HelioError::fits("SIMPLE is not T"));
    }

    let bitpix = required_integer(&header, "BITPIX")?;
    let naxis = required_integer(&header, "NAXIS")?;
    if naxis != 1 {
        return Err(HelioError::fits(format!(
            "expected a 1-D primary array, NAXIS = {}",
            naxis
        )));
    }
    let length = u64::try_from(required_integer(&header, "NAXIS1")?)
        .map_err(|_| HelioError::fits("NAXIS1 is negative"))?;

    let element_size: u64 = match bitpix {
        8 => 1,
        16 => 2,
        32 | -32 => 4,
        64 | -64 => 8,
        other => return Err(HelioError::fits(format!("unsupported BITPIX {}", other))),
    };

    // The array must fit in the file before anything is allocated for it
    let data_len = length
        .checked_mul(element_size)
        .ok_or_else(|| HelioError::fits(format!("NAXIS1 {} overflows the array size", length)))?;
    if data_len > file_len {
        return Err(HelioError::fits(format!(
            "data array of {} bytes exceeds file size of {} bytes",
            data_len, file_len
        )));
    }

    let raw: Vec<f64> = if length == 0 {
        Vec::new()
    } else {
        hdu.read_image(&mut fits_file)?
    };

    let bscale = header.get("BSCALE").and_then(MetaValue::as_f64).unwrap_or(1.0);
    let bzero = header.get("BZERO").and_then(MetaValue::as_f64).unwrap_or(0.0);
    let blank = match header.get("BLANK") {
        Some(MetaValue::Integer(blank)) if bitpix > 0 => Some(bzero + bscale * *blank as f64),
        _ => None,
    };

    debug!(
        "FITS primary array: {} values, BITPIX {}, BSCALE {}, BZERO {}",
        raw.len(),
        bitpix,
        bscale,
        bzero
    );

    let data = raw
        .into_iter()
        .map(|value| {
            if !value.is_finite() || Some(value) == blank {
                None
            } else {
                Some(value)
            }
        })
        .collect();

    Ok(PrimaryHdu { header, data })
}

/// Transcribe the current HDU's header cards in order
fn read_header(fits_file: &mut FitsFile, hdu: &FitsHdu) -> Result<Meta> {
    let mut header = Meta::new();
    let mut status: c_int = 0;
    let mut card_count: c_int = 0;
    let mut more_keys: c_int = 0;

    // SAFETY: `fits_file` owns an open cfitsio handle whose current HDU is the
    // primary one; the buffers outlive each call and exceed cfitsio's limits.
    unsafe {
        fitsio_sys::ffghsp(fits_file.as_raw(), &mut card_count, &mut more_keys, &mut status);
    }
    if status != 0 {
        return Err(HelioError::fits(format!(
            "cannot count header cards (cfitsio status {})",
            status
        )));
    }

    for index in 1..=card_count {
        let mut keyword: [c_char; FIELD_BUFFER] = [0; FIELD_BUFFER];
        let mut value: [c_char; FIELD_BUFFER] = [0; FIELD_BUFFER];
        let mut comment: [c_char; FIELD_BUFFER] = [0; FIELD_BUFFER];

        // SAFETY: as above; cfitsio writes NUL-terminated strings into the buffers
        let (keyword, value, comment) = unsafe {
            fitsio_sys::ffgkyn(
                fits_file.as_raw(),
                index,
                keyword.as_mut_ptr(),
                value.as_mut_ptr(),
                comment.as_mut_ptr(),
                &mut status,
            );
            (
                CStr::from_ptr(keyword.as_ptr()).to_string_lossy().into_owned(),
                CStr::from_ptr(value.as_ptr()).to_string_lossy().into_owned(),
                CStr::from_ptr(comment.as_ptr()).to_string_lossy().into_owned(),
            )
        };
        if status != 0 {
            return Err(HelioError::fits(format!(
                "card {} is unreadable (cfitsio status {})",
                index, status
            )));
        }

        let keyword = keyword.trim();
        if keyword.is_empty() {
            continue;
        }
        if COMMENTARY_KEYWORDS.contains(&keyword) {
            header.insert(keyword, comment.trim());
            continue;
        }

        let value = value.trim();
        if value.is_empty() {
            debug!("Skipping FITS card without value: {}", keyword);
            continue;
        }

        let typed = if value.starts_with('\'') {
            MetaValue::Text(hdu.read_key::<String>(fits_file, keyword)?)
        } else {
            typed_value(value)
        };
        header.insert(keyword, typed);
    }

    debug!("FITS header has {} cards", card_count);
    Ok(header)
}

/// Type an unquoted value string as returned by cfitsio
fn typed_value(value: &str) -> MetaValue {
    match value {
        "T" => MetaValue::Logical(true),
        "F" => MetaValue::Logical(false),
        _ => {
            if let Ok(integer) = value.parse::<i64>() {
                MetaValue::Integer(integer)
            } else if let Ok(float) = value.replace(['D', 'd'], "E").parse::<f64>() {
                MetaValue::Float(float)
            } else {
                MetaValue::Text(value.to_string())
            }
        }
    }
}

fn required_integer(header: &Meta, keyword: &str) -> Result<i64> {
    match header.get(keyword) {
        Some(MetaValue::Integer(value)) => Ok(*value),
        Some(other) => Err(HelioError::fits(format!(
            "{} must be an integer, found {}",
            keyword, other
        ))),
        None => Err(HelioError::fits(format!("missing required keyword {}", keyword))),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{BLOCK_SIZE, CARD_SIZE};

    /// Format one 80-column card
    pub fn card(text: &str) -> String {
        format!("{:<width$}", text, width = CARD_SIZE)
    }

    /// Assemble a FITS file from card texts and big-endian data bytes
    pub fn build_fits(cards: &[&str], data: &[u8]) -> Vec<u8> {
        let mut bytes: Vec<u8> = cards.iter().flat_map(|text| card(text).into_bytes()).collect();
        bytes.extend(card("END").into_bytes());
        bytes.resize(bytes.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, b' ');
        bytes.extend_from_slice(data);
        bytes.resize(bytes.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, 0);
        bytes
    }

    pub fn f32_data(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|value| value.to_be_bytes()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_read_float_array_and_header_order() {
        let bytes = build_fits(
            &[
                "SIMPLE  =                    T / conforms to FITS",
                "BITPIX  =                  -32",
                "NAXIS   =                    1",
                "NAXIS1  =                    3",
                "DATE-OBS= '2011-06-07'         / observation date",
                "OBSERVER= 'O''Brien'",
                "CRVAL1  = '06:23:00.000'",
                "CDELT1  =                  1.0",
                "COMMENT correlation plot",
            ],
            &f32_data(&[0.5, f32::NAN, 0.25]),
        );

        let hdu = read_primary_hdu(&bytes).unwrap();
        assert_eq!(hdu.data, vec![Some(0.5), None, Some(0.25)]);

        let keys: Vec<&str> = hdu.header.keys().collect();
        assert_eq!(
            keys,
            vec![
                "SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "DATE-OBS", "OBSERVER", "CRVAL1", "CDELT1",
                "COMMENT"
            ]
        );
        assert_eq!(hdu.header.get_str("DATE-OBS"), Some("2011-06-07"));
        assert_eq!(hdu.header.get_str("OBSERVER"), Some("O'Brien"));
        assert_eq!(hdu.header.get("CDELT1"), Some(&MetaValue::Float(1.0)));
        assert_eq!(hdu.header.get("NAXIS1"), Some(&MetaValue::Integer(3)));
        assert_eq!(hdu.header.get_str("COMMENT"), Some("correlation plot"));
    }

    #[test]
    fn test_integer_array_with_scaling_and_blank() {
        let data: Vec<u8> = [10i16, -1, 20]
            .iter()
            .flat_map(|value| value.to_be_bytes())
            .collect();
        let bytes = build_fits(
            &[
                "SIMPLE  =                    T",
                "BITPIX  =                   16",
                "NAXIS   =                    1",
                "NAXIS1  =                    3",
                "BSCALE  =                  0.5",
                "BZERO   =                  1.0",
                "BLANK   =                   -1",
            ],
            &data,
        );

        let hdu = read_primary_hdu(&bytes).unwrap();
        assert_eq!(hdu.data, vec![Some(6.0), None, Some(11.0)]);
    }

    #[test]
    fn test_rejects_multi_dimensional_and_truncated() {
        let bytes = build_fits(
            &[
                "SIMPLE  =                    T",
                "BITPIX  =                  -32",
                "NAXIS   =                    2",
                "NAXIS1  =                    2",
                "NAXIS2  =                    2",
            ],
            &f32_data(&[0.0; 4]),
        );
        assert!(matches!(
            read_primary_hdu(&bytes),
            Err(HelioError::FitsMalformed { .. })
        ));

        let mut bytes = build_fits(
            &[
                "SIMPLE  =                    T",
                "BITPIX  =                  -64",
                "NAXIS   =                    1",
                "NAXIS1  =                 1000",
            ],
            &[],
        );
        bytes.truncate(BLOCK_SIZE);
        assert!(matches!(
            read_primary_hdu(&bytes),
            Err(HelioError::FitsMalformed { .. })
        ));
    }

    #[test]
    fn test_oversized_naxis1_is_an_error() {
        let bytes = build_fits(
            &[
                "SIMPLE  =                    T",
                "BITPIX  =                  -32",
                "NAXIS   =                    1",
                "NAXIS1  =  4611686018427387905",
            ],
            &f32_data(&[1.0]),
        );
        assert!(matches!(
            read_primary_hdu(&bytes),
            Err(HelioError::FitsMalformed { .. })
        ));
    }

    #[test]
    fn test_missing_end_card() {
        let bytes = card("SIMPLE  =                    T").into_bytes();
        assert!(read_primary_hdu(&bytes).is_err());
    }

    #[test]
    fn test_typed_value() {
        assert_eq!(typed_value("1.5D-3"), MetaValue::Float(1.5e-3));
        assert_eq!(typed_value("42"), MetaValue::Integer(42));
        assert_eq!(typed_value("F"), MetaValue::Logical(false));
        assert_eq!(typed_value("(1, 2)"), MetaValue::Text("(1, 2)".into()));
    }

    #[test]
    fn test_is_fits() {
        assert!(is_fits(card("SIMPLE  =                    T").as_bytes()));
        assert!(!is_fits(b"Date,XRS"));
    }
}
