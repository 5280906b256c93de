//! The export run: read → clean → aggregate → correct → serialize.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::analysis::aggregate::aggregate_by_cell;
use crate::analysis::outliers::correct_outliers;
use crate::config::{ExportConfig, OutlierConfig};
use crate::db;
use crate::error::ExportError;
use crate::ingest::PredictionSource;
use crate::ingest::pg::PgSource;
use crate::logging::{self, Stage};
use crate::model::{Payload, PredictionRow};
use crate::output;

/// Counters from building a payload, before anything is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub fetched_rows: usize,
    pub dropped_rows: usize,
    pub outliers_corrected: usize,
    pub clamped: usize,
}

/// Outcome of a successful run; `Display` renders the one-line summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub output_path: PathBuf,
    pub records: usize,
    pub weather_datetime: Option<String>,
    pub compressed_bytes: u64,
    pub stats: BuildStats,
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wrote {}  rows={}  meta.weather_datetime={}  outliers_corrected={}",
            self.output_path.display(),
            self.records,
            self.weather_datetime.as_deref().unwrap_or("None"),
            self.stats.outliers_corrected
        )
    }
}

/// Reads from `source` and produces the payload in memory.
///
/// Fails with `EmptyResult` when the prediction read returns nothing and
/// with `NoUsableRows` when cleaning drops every row.
pub fn build_payload<S: PredictionSource>(
    source: &mut S,
    band: &OutlierConfig,
) -> Result<(Payload, BuildStats), ExportError> {
    let table = source.describe();
    let raw = source.fetch_predictions()?;
    if raw.is_empty() {
        return Err(ExportError::EmptyResult { table });
    }

    let fetched_rows = raw.len();
    let rows: Vec<PredictionRow> = raw.into_iter().filter_map(|r| r.clean()).collect();
    logging::log_cleaning_summary(&table, fetched_rows, rows.len());
    if rows.is_empty() {
        return Err(ExportError::NoUsableRows {
            table,
            dropped: fetched_rows,
        });
    }

    let mut records = aggregate_by_cell(&rows);
    logging::info(
        Stage::Aggregate,
        Some(table.as_str()),
        &format!("Aggregated {} rows into {} cells", rows.len(), records.len()),
    );

    let report = correct_outliers(&mut records, band);
    if band.enabled {
        logging::log_outlier_summary(report.corrected, records.len(), band.low, band.high);
    }
    if report.clamped > 0 {
        logging::debug(
            Stage::Aggregate,
            None,
            &format!("Clamped {} cells into [0, 1]", report.clamped),
        );
    }

    let weather_datetime = source.fetch_latest_weather()?;
    if weather_datetime.is_none() {
        logging::warn(Stage::Database, None, "No weather timestamp found; meta.weather_datetime will be null");
    }

    let stats = BuildStats {
        fetched_rows,
        dropped_rows: fetched_rows - rows.len(),
        outliers_corrected: report.corrected,
        clamped: report.clamped,
    };
    Ok((Payload::from_records(&records, weather_datetime), stats))
}

/// Builds the payload from `source` and writes it to `output_path`.
///
/// Nothing is written unless the whole build succeeds.
pub fn run_export<S: PredictionSource>(
    source: &mut S,
    output_path: &Path,
    band: &OutlierConfig,
) -> Result<ExportSummary, ExportError> {
    output::prepare_output_path(output_path)?;

    let (payload, stats) = build_payload(source, band)?;
    let compressed_bytes = output::write_payload(output_path, &payload)?;
    logging::info(
        Stage::Output,
        Some(output_path.display().to_string().as_str()),
        &format!("Wrote {} cells ({} bytes gzip)", payload.data.len(), compressed_bytes),
    );

    Ok(ExportSummary {
        output_path: output_path.to_path_buf(),
        records: payload.data.len(),
        weather_datetime: payload.meta.weather_datetime,
        compressed_bytes,
        stats,
    })
}

/// Full production run against PostgreSQL.
///
/// The output path is checked before the connection is opened.
pub fn run_from_config(config: &ExportConfig) -> Result<ExportSummary, ExportError> {
    output::prepare_output_path(&config.output_path)?;

    let client = db::connect_and_verify(&config.database_url, &PgSource::required_tables(config))?;
    let mut source = PgSource::new(client, config);
    run_export(&mut source, &config.output_path, &config.outliers)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
