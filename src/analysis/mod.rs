//! Aggregation and cleanup of per-cell prediction values.
//!
//! Submodules:
//! - `aggregate` — collapses duplicate H3 rows into one record per cell.
//! - `outliers` — replaces out-of-band probabilities with their parent-cell
//!   mean and clamps everything into `[0, 1]`.

pub mod aggregate;
pub mod outliers;

/// Incremental arithmetic mean.
///
/// Each step scales both the current mean and the new value by `1/n` before
/// adding, so finite inputs never overflow the way `sum / count` does near
/// `f64::MAX`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    mean: f64,
    count: usize,
}

impl RunningMean {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let n = self.count as f64;
        self.mean = self.mean - self.mean / n + value / n;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// `None` until a value has been pushed.
    pub fn value(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }
}
