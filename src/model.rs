//! Core data types for the H3 prediction export.
//!
//! This module defines the shared domain model imported by all other modules.
//! It contains no logic beyond row cleaning and no I/O.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Outlier band defaults
// ---------------------------------------------------------------------------

/// Lower edge of the acceptable probability band (inclusive).
pub const OUTLIER_LOW: f64 = 0.05;

/// Upper edge of the acceptable probability band (inclusive).
pub const OUTLIER_HIGH: f64 = 0.95;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A prediction row exactly as it comes back from the database.
///
/// Every column is nullable in the source table, so each field is optional
/// until `clean` decides whether the row is usable.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPredictionRow {
    pub h3: Option<String>,
    pub parent_h3: Option<String>,
    pub probability: Option<f64>,
}

impl RawPredictionRow {
    pub fn new(h3: &str, parent_h3: &str, probability: f64) -> Self {
        Self {
            h3: Some(h3.to_string()),
            parent_h3: Some(parent_h3.to_string()),
            probability: Some(probability),
        }
    }

    /// Converts into a `PredictionRow`, or `None` if any column is missing
    /// or the probability is NaN or infinite.
    pub fn clean(self) -> Option<PredictionRow> {
        let probability = self.probability.filter(|p| p.is_finite())?;
        Some(PredictionRow {
            spatial_key: self.h3?,
            parent_key: self.parent_h3?,
            probability,
        })
    }
}

/// A single usable prediction for one H3 cell.
///
/// The same `spatial_key` may appear many times in the source table (one
/// row per model run or per feature window); aggregation collapses them.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    pub spatial_key: String,
    pub parent_key: String,
    pub probability: f64,
}

impl PredictionRow {
    pub fn new(spatial_key: &str, parent_key: &str, probability: f64) -> Self {
        Self {
            spatial_key: spatial_key.to_string(),
            parent_key: parent_key.to_string(),
            probability,
        }
    }
}

/// One de-duplicated cell: mean probability and most frequent parent.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    pub spatial_key: String,
    pub parent_key: String,
    pub probability: f64,
}

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// Metadata block of the payload.
///
/// `weather_datetime` serializes as an explicit `null` when no timestamp is
/// available; downstream clients rely on the key being present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadMeta {
    pub weather_datetime: Option<String>,
}

/// The document written to disk:
/// `{"data":[[h3, probability], ...], "meta":{"weather_datetime": ...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub data: Vec<(String, f64)>,
    pub meta: PayloadMeta,
}

impl Payload {
    /// Builds the payload in record order. Parent keys are not exported.
    pub fn from_records(records: &[AggregatedRecord], weather_datetime: Option<String>) -> Self {
        Payload {
            data: records
                .iter()
                .map(|r| (r.spatial_key.clone(), r.probability))
                .collect(),
            meta: PayloadMeta { weather_datetime },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
