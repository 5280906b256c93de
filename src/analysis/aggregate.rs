//! De-duplication of prediction rows by H3 cell.
//!
//! Grouping happens in memory: each distinct spatial key gets an accumulator
//! holding a running mean of the probability and a frequency table of the
//! parent keys seen for that cell. Finalizing an accumulator yields the mean
//! probability and the modal parent key.

use std::collections::{BTreeMap, HashMap};

use crate::analysis::RunningMean;
use crate::model::{AggregatedRecord, PredictionRow};

#[derive(Debug, Default)]
struct CellAccumulator {
    probability: RunningMean,
    // BTreeMap so ties resolve to the lexicographically smallest parent.
    parents: BTreeMap<String, usize>,
}

impl CellAccumulator {
    fn push(&mut self, row: &PredictionRow) {
        self.probability.push(row.probability);
        *self.parents.entry(row.parent_key.clone()).or_insert(0) += 1;
    }

    fn finish(self, spatial_key: String) -> AggregatedRecord {
        AggregatedRecord {
            spatial_key,
            parent_key: modal_parent(&self.parents),
            probability: self.probability.value().unwrap_or_default(),
        }
    }
}

/// Returns the most frequent key. Ties go to the smallest key because the
/// map iterates in ascending order and only a strictly larger count replaces
/// the current best.
fn modal_parent(parents: &BTreeMap<String, usize>) -> String {
    let mut best: Option<(&String, usize)> = None;
    for (key, &count) in parents {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((key, count)),
        }
    }
    best.map(|(key, _)| key.clone()).unwrap_or_default()
}

/// Collapses rows into one `AggregatedRecord` per distinct spatial key.
///
/// Output order is the order in which each spatial key first appears in
/// `rows`, so the same query result always yields the same payload.
pub fn aggregate_by_cell(rows: &[PredictionRow]) -> Vec<AggregatedRecord> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut cells: Vec<(String, CellAccumulator)> = Vec::new();

    for row in rows {
        let slot = *index.entry(row.spatial_key.as_str()).or_insert_with(|| {
            cells.push((row.spatial_key.clone(), CellAccumulator::default()));
            cells.len() - 1
        });
        cells[slot].1.push(row);
    }

    cells
        .into_iter()
        .map(|(key, acc)| acc.finish(key))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
