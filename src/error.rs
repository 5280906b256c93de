//! Error type for the export pipeline.
//!
//! Every failure is terminal: `main` logs the error and exits non-zero.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    /// Missing or invalid settings. Raised before any database or file I/O.
    #[error("configuration error: {0}")]
    Config(String),

    /// The TOML configuration file exists but could not be parsed.
    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Connection or query failure.
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),

    /// Required tables are absent from the target database.
    #[error("database is missing required tables: {}", .0.join(", "))]
    MissingTables(Vec<String>),

    /// The prediction query returned zero rows.
    #[error("No rows returned from {table}. Check table/columns/SQL.")]
    EmptyResult { table: String },

    /// Rows were returned but every one of them was dropped during cleaning.
    #[error("no usable rows in {table}: all {dropped} rows were missing h3, parent_h3 or a finite probability")]
    NoUsableRows { table: String, dropped: usize },

    /// The output path resolves to a directory.
    #[error("output path points to a directory: {0}")]
    OutputIsDirectory(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.into(),
            source,
        }
    }
}
