//! Exports H3 cell prediction probabilities from PostgreSQL into a
//! gzip-compressed JSON payload for the map client.
//!
//! Rows are de-duplicated per cell (mean probability, modal parent cell),
//! out-of-band probabilities are replaced with their parent-cell mean, and
//! the result is written together with the latest weather timestamp.

pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod output;
pub mod pipeline;

pub use error::ExportError;
pub use pipeline::{ExportSummary, run_export, run_from_config};
