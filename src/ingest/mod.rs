//! Sources of prediction rows and the weather timestamp.
//!
//! The pipeline only needs two reads, so they sit behind one small trait.
//! `pg::PgSource` is the production implementation; `StaticSource`
//! serves fixed data for tests and offline runs.

pub mod pg;

use crate::error::ExportError;
use crate::model::RawPredictionRow;

/// The two reads the export performs.
pub trait PredictionSource {
    /// Name used in logs and error messages (usually the table name).
    fn describe(&self) -> String;

    /// Bulk read of `(h3, parent_h3, probability)` rows.
    fn fetch_predictions(&mut self) -> Result<Vec<RawPredictionRow>, ExportError>;

    /// Most recent weather timestamp as ISO-8601, or `None` if the table is empty.
    fn fetch_latest_weather(&mut self) -> Result<Option<String>, ExportError>;
}

/// In-memory source returning fixed rows and timestamp.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub rows: Vec<RawPredictionRow>,
    pub weather_datetime: Option<String>,
}

impl StaticSource {
    pub fn new(rows: Vec<RawPredictionRow>, weather_datetime: Option<&str>) -> Self {
        Self {
            rows,
            weather_datetime: weather_datetime.map(String::from),
        }
    }
}

impl PredictionSource for StaticSource {
    fn describe(&self) -> String {
        "static".to_string()
    }

    fn fetch_predictions(&mut self) -> Result<Vec<RawPredictionRow>, ExportError> {
        Ok(self.rows.clone())
    }

    fn fetch_latest_weather(&mut self) -> Result<Option<String>, ExportError> {
        Ok(self.weather_datetime.clone())
    }
}
