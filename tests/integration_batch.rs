//! Integration tests for directory discovery and batch ingestion

use helio_timeseries::{BatchIngestor, HelioError, IngestConfig, Source};
use std::fs;
use tempfile::TempDir;

const EVE_FILE: &str = "\
; Missing data: -99
; Column descriptions:
; fieldA: first channel
; fieldB: second channel
; Format:
2013 015 01 15
0000 -99 3.2
0001 1.0 3.3
";

fn fixture_dir() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("2013").join("015");
    fs::create_dir_all(&nested).unwrap();

    fs::write(temp_dir.path().join("a_eve.txt"), EVE_FILE).unwrap();
    fs::write(nested.join("b_eve.txt"), EVE_FILE).unwrap();
    fs::write(temp_dir.path().join("c_broken.txt"), "not an instrument file\n").unwrap();
    fs::write(temp_dir.path().join("d_plot.png"), [0x89u8, b'P', b'N', b'G']).unwrap();
    temp_dir
}

/// Purpose: Directory walking keeps accepted extensions only, in sorted order
/// Benefit: Stray files next to the data never reach the parsers
#[test]
fn test_discover_filters_by_extension() {
    let temp_dir = fixture_dir();
    let ingestor = BatchIngestor::new(IngestConfig::default().without_progress()).unwrap();

    let files = ingestor.discover(&[temp_dir.path().to_path_buf()]).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(files.len(), 3);
    assert!(names.contains(&"a_eve.txt".to_string()));
    assert!(names.contains(&"b_eve.txt".to_string()));
    assert!(names.contains(&"c_broken.txt".to_string()));
    assert!(!names.contains(&"d_plot.png".to_string()));
}

/// Purpose: Missing inputs are reported instead of silently skipped
/// Benefit: Typos on the command line fail loudly
#[test]
fn test_discover_missing_input() {
    let temp_dir = TempDir::new().unwrap();
    let ingestor = BatchIngestor::new(IngestConfig::default().without_progress()).unwrap();

    let result = ingestor.discover(&[temp_dir.path().join("absent")]);
    assert!(matches!(result, Err(HelioError::Io(_))));
}

/// Purpose: One bad file fails alone while the others still parse
/// Benefit: Batch runs over archive days are not derailed by a single file
#[tokio::test]
async fn test_ingest_isolates_failures() {
    let temp_dir = fixture_dir();
    let ingestor = BatchIngestor::new(
        IngestConfig::default()
            .with_max_concurrent_files(2)
            .without_progress(),
    )
    .unwrap();

    let files = ingestor.discover(&[temp_dir.path().to_path_buf()]).unwrap();
    let (outcomes, stats) = ingestor.ingest(&files).await;

    assert_eq!(outcomes.len(), files.len());
    for (outcome, path) in outcomes.iter().zip(&files) {
        assert_eq!(&outcome.path, path);
    }

    assert_eq!(stats.files_parsed, 2);
    assert_eq!(stats.files_failed, 1);
    assert_eq!(stats.total_rows, 4);

    for outcome in &outcomes {
        let is_broken = outcome.path.ends_with("c_broken.txt");
        match &outcome.result {
            Ok(record) => {
                assert!(!is_broken);
                assert_eq!(record.source(), Source::Eve);
                assert_eq!(record.values("fieldA").unwrap(), vec![None, Some(1.0)]);
            }
            Err(e) => {
                assert!(is_broken);
                assert!(matches!(e, HelioError::UnrecognizedFormat { .. }));
            }
        }
    }
}

/// Purpose: A configured source hint applies to every file in the batch
/// Benefit: Mismatched content is caught per file
#[tokio::test]
async fn test_ingest_with_source_hint() {
    let temp_dir = fixture_dir();
    let ingestor = BatchIngestor::new(
        IngestConfig::default()
            .with_source_hint("NoRH")
            .without_progress(),
    )
    .unwrap();

    let files = vec![temp_dir.path().join("a_eve.txt")];
    let (outcomes, stats) = ingestor.ingest(&files).await;

    assert_eq!(stats.files_failed, 1);
    assert!(matches!(
        outcomes[0].result,
        Err(HelioError::SourceMismatch { .. })
    ));
}

/// Purpose: Invalid settings are rejected when the ingestor is built
#[test]
fn test_invalid_config_rejected() {
    let result = BatchIngestor::new(IngestConfig::default().with_max_concurrent_files(0));
    assert!(matches!(result, Err(HelioError::Configuration { .. })));
}
