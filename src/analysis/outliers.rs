//! Outlier replacement for aggregated cell probabilities.
//!
//! A cell whose probability falls strictly outside the configured band is
//! replaced with the mean probability of every cell sharing its parent. The
//! parent means are computed once, from the values as they stood before any
//! replacement, so other outliers in the same parent contribute to the mean.
//! If a parent mean is missing or not finite the global mean over the finite
//! cells is used instead; if that is unusable too the cell is left as is.
//!
//! The pass runs once: a replacement value is not checked against the band
//! again. Every cell is clamped into `[0, 1]` afterwards, with NaN mapped to
//! `0.0`.

use std::collections::HashMap;

use crate::analysis::RunningMean;
use crate::config::OutlierConfig;
use crate::model::AggregatedRecord;

/// What the pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutlierReport {
    /// Cells replaced by their parent (or global) mean.
    pub corrected: usize,
    /// Cells whose final value was pulled into `[0, 1]` by the clamp.
    pub clamped: usize,
}

/// Mean probability per parent key.
pub fn parent_means(records: &[AggregatedRecord]) -> HashMap<String, f64> {
    let mut means: HashMap<&str, RunningMean> = HashMap::new();
    for r in records {
        means.entry(r.parent_key.as_str()).or_default().push(r.probability);
    }
    means
        .into_iter()
        .filter_map(|(parent, mean)| mean.value().map(|m| (parent.to_string(), m)))
        .collect()
}

/// Mean probability across the finite records, or `None` when there are none.
pub fn global_mean(records: &[AggregatedRecord]) -> Option<f64> {
    let mut mean = RunningMean::default();
    for r in records.iter().filter(|r| r.probability.is_finite()) {
        mean.push(r.probability);
    }
    mean.value()
}

/// Pulls `p` into `[0, 1]`. NaN has no place in the band and becomes `0.0`.
pub fn clamp_unit(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

/// Applies outlier replacement (when enabled) and the final clamp in place.
pub fn correct_outliers(records: &mut [AggregatedRecord], band: &OutlierConfig) -> OutlierReport {
    let mut report = OutlierReport::default();

    if band.enabled {
        let means = parent_means(records);
        let fallback = global_mean(records).filter(|m| m.is_finite());

        for record in records.iter_mut() {
            if !band.is_outlier(record.probability) {
                continue;
            }
            let replacement = means
                .get(&record.parent_key)
                .copied()
                .filter(|m| m.is_finite())
                .or(fallback);
            if let Some(value) = replacement {
                record.probability = value;
                report.corrected += 1;
            }
        }
    }

    for record in records.iter_mut() {
        let clamped = clamp_unit(record.probability);
        if clamped.to_bits() != record.probability.to_bits() {
            record.probability = clamped;
            report.clamped += 1;
        }
    }

    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
