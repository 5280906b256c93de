//! End-to-end tests for the export pipeline using an in-memory source.
//!
//! These tests verify:
//! 1. The written file decompresses and parses back to the built payload
//! 2. Output invariants (unique keys, probabilities in [0, 1])
//! 3. Failure paths leave the output file untouched
//!
//! No database is required; see `database_integration.rs` for PostgreSQL.

use std::collections::HashSet;
use std::fs;
use std::io::Read;

use flate2::read::GzDecoder;
use h3_payload::ExportError;
use h3_payload::config::OutlierConfig;
use h3_payload::ingest::StaticSource;
use h3_payload::model::RawPredictionRow;
use h3_payload::output::read_payload;
use h3_payload::pipeline::{build_payload, run_export};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn raw(h3: &str, parent: &str, p: f64) -> RawPredictionRow {
    RawPredictionRow::new(h3, parent, p)
}

/// A small basin of res-9 cells under three res-8 parents, with duplicates,
/// nulls, and values on both sides of the band.
fn sample_rows() -> Vec<RawPredictionRow> {
    vec![
        raw("892a1008003ffff", "882a100801fffff", 0.42),
        raw("892a1008007ffff", "882a100801fffff", 0.58),
        raw("892a1008003ffff", "882a100801fffff", 0.46),
        raw("892a100800bffff", "882a100801fffff", 0.99),
        raw("892a100a6c3ffff", "882a100a6dfffff", 0.01),
        raw("892a100a6c7ffff", "882a100a6dfffff", 0.30),
        raw("892a100a6c7ffff", "882a100a6dfffff", 0.34),
        raw("892a100e4a3ffff", "882a100e4bfffff", 1.75),
        RawPredictionRow { probability: None, ..raw("892a100e4a7ffff", "882a100e4bfffff", 0.0) },
        RawPredictionRow { parent_h3: None, ..raw("892a100e4abffff", "882a100e4bfffff", 0.5) },
    ]
}

fn read_json(path: &std::path::Path) -> String {
    let mut json = String::new();
    GzDecoder::new(fs::File::open(path).unwrap())
        .read_to_string(&mut json)
        .unwrap();
    json
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

#[test]
fn test_written_file_round_trips_to_built_payload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("assets").join("backend").join("predictions.json.gz");

    let mut source = StaticSource::new(sample_rows(), Some("2025-08-14T06:30:05+00:00"));
    let (expected, _) = build_payload(&mut source, &OutlierConfig::default()).unwrap();

    let mut source = StaticSource::new(sample_rows(), Some("2025-08-14T06:30:05+00:00"));
    let summary = run_export(&mut source, &path, &OutlierConfig::default()).unwrap();

    assert_eq!(read_payload(&path).unwrap(), expected);
    assert_eq!(summary.records, 6);
    assert_eq!(summary.stats.fetched_rows, 10);
    assert_eq!(summary.stats.dropped_rows, 2);
    assert_eq!(summary.weather_datetime.as_deref(), Some("2025-08-14T06:30:05+00:00"));
}

#[test]
fn test_output_invariants_hold() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predictions.json.gz");
    let mut source = StaticSource::new(sample_rows(), None);
    run_export(&mut source, &path, &OutlierConfig::default()).unwrap();

    let payload = read_payload(&path).unwrap();
    let keys: HashSet<&str> = payload.data.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys.len(), payload.data.len(), "spatial keys must be unique");
    for (key, p) in &payload.data {
        assert!((0.0..=1.0).contains(p), "{} has probability {} outside [0, 1]", key, p);
    }
}

#[test]
fn test_extreme_finite_values_stay_in_unit_interval() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predictions.json.gz");
    let rows = vec![
        raw("892a1008003ffff", "882a100801fffff", 1.7e308),
        raw("892a1008003ffff", "882a100801fffff", 1.7e308),
        raw("892a1008007ffff", "882a100801fffff", -1.7e308),
        raw("892a1008007ffff", "882a100801fffff", -1.7e308),
        raw("892a100a6c3ffff", "882a100a6dfffff", 0.5),
    ];
    let mut source = StaticSource::new(rows, None);
    let summary = run_export(&mut source, &path, &OutlierConfig::default()).unwrap();
    assert_eq!(summary.stats.outliers_corrected, 2);

    let json = read_json(&path);
    assert!(!json.contains("null,") && !json.contains("null]"), "NaN leaked into output: {}", json);

    let payload = read_payload(&path).unwrap();
    assert_eq!(
        payload.data,
        vec![
            ("892a1008003ffff".to_string(), 0.0),
            ("892a1008007ffff".to_string(), 0.0),
            ("892a100a6c3ffff".to_string(), 0.5),
        ]
    );
}

#[test]
fn test_outliers_replaced_with_parent_mean() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predictions.json.gz");
    let mut source = StaticSource::new(sample_rows(), None);
    let summary = run_export(&mut source, &path, &OutlierConfig::default()).unwrap();

    // 0.99 (parent ...801), 0.01 (parent ...6df) and 1.75 (parent ...4bf).
    assert_eq!(summary.stats.outliers_corrected, 3);

    let payload = read_payload(&path).unwrap();
    let prob = |key: &str| payload.data.iter().find(|(k, _)| k == key).unwrap().1;

    // Parent 882a100801fffff: cells 0.44, 0.58, 0.99 -> mean 2.01 / 3 = 0.67
    assert!((prob("892a100800bffff") - 0.67).abs() < 1e-9);
    // Parent 882a100a6dfffff: cells 0.01, 0.32 -> mean 0.165
    assert!((prob("892a100a6c3ffff") - 0.165).abs() < 1e-9);
    // Lone cell in 882a100e4bfffff keeps its own mean 1.75, then clamps.
    assert_eq!(prob("892a100e4a3ffff"), 1.0);
    // In-band duplicates are simply averaged.
    assert!((prob("892a1008003ffff") - 0.44).abs() < 1e-9);
}

#[test]
fn test_order_follows_first_appearance() {
    let mut source = StaticSource::new(sample_rows(), None);
    let (payload, _) = build_payload(&mut source, &OutlierConfig::default()).unwrap();
    let keys: Vec<&str> = payload.data.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "892a1008003ffff",
            "892a1008007ffff",
            "892a100800bffff",
            "892a100a6c3ffff",
            "892a100a6c7ffff",
            "892a100e4a3ffff",
        ]
    );
}

#[test]
fn test_missing_weather_timestamp_is_explicit_null() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predictions.json.gz");
    let mut source = StaticSource::new(sample_rows(), None);
    run_export(&mut source, &path, &OutlierConfig::default()).unwrap();

    let json = read_json(&path);
    assert!(json.ends_with(r#""meta":{"weather_datetime":null}}"#), "got {}", json);
}

#[test]
fn test_disabled_outliers_only_clamp() {
    let band = OutlierConfig { enabled: false, ..OutlierConfig::default() };
    let mut source = StaticSource::new(sample_rows(), None);
    let (payload, stats) = build_payload(&mut source, &band).unwrap();

    assert_eq!(stats.outliers_corrected, 0);
    let prob = |key: &str| payload.data.iter().find(|(k, _)| k == key).unwrap().1;
    assert_eq!(prob("892a100800bffff"), 0.99);
    assert_eq!(prob("892a100a6c3ffff"), 0.01);
    assert_eq!(prob("892a100e4a3ffff"), 1.0);
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[test]
fn test_empty_input_creates_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predictions.json.gz");
    let mut source = StaticSource::new(Vec::new(), Some("2025-08-14T06:30:05+00:00"));

    let err = run_export(&mut source, &path, &OutlierConfig::default()).unwrap_err();
    assert!(matches!(err, ExportError::EmptyResult { .. }));
    assert!(!path.exists(), "no output file should be created on empty input");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0, "no temp file either");
}

#[test]
fn test_empty_input_leaves_previous_payload_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predictions.json.gz");
    fs::write(&path, b"previous payload").unwrap();

    let mut source = StaticSource::new(Vec::new(), None);
    assert!(run_export(&mut source, &path, &OutlierConfig::default()).is_err());
    assert_eq!(fs::read(&path).unwrap(), b"previous payload");
}

#[test]
fn test_directory_output_path_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = StaticSource::new(sample_rows(), None);
    let err = run_export(&mut source, dir.path(), &OutlierConfig::default()).unwrap_err();
    assert!(matches!(err, ExportError::OutputIsDirectory(_)), "got {:?}", err);
}
