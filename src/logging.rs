//! Structured logging for the prediction export
//!
//! Provides stage-tagged logging with optional cell/table identifiers,
//! timestamps, and severity levels. Supports both console output
//! and file-based logging for scheduled (cron) runs.

use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Database,
    Aggregate,
    Output,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Config => write!(f, "CFG"),
            Stage::Database => write!(f, "DB"),
            Stage::Aggregate => write!(f, "AGG"),
            Stage::Output => write!(f, "OUT"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<PathBuf>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<PathBuf>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn format_entry(level: LogLevel, stage: Stage, key: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let key_part = key.map(|k| format!(" [{}]", k)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, stage, key_part, message)
    }

    fn log(&self, level: LogLevel, stage: Stage, key: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, stage, key, message);
        let key_part = key.map(|k| format!(" [{}]", k)).unwrap_or_default();

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", log_entry),
                LogLevel::Debug => println!("   {}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, key_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, key_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", stage, key_part, message),
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path.display(), e);
            }
        }
    }

    fn append_to_file(path: &Path, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&Path>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(Path::to_path_buf), console_timestamps);
}

fn dispatch(level: LogLevel, stage: Stage, key: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, stage, key, message);
        }
    }
}

/// Log a general informational message
pub fn info(stage: Stage, key: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, stage, key, message);
}

/// Log a warning message
pub fn warn(stage: Stage, key: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, stage, key, message);
}

/// Log an error message
pub fn error(stage: Stage, key: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, stage, key, message);
}

/// Log a debug message
pub fn debug(stage: Stage, key: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, stage, key, message);
}

// ---------------------------------------------------------------------------
// Summary Logging
// ---------------------------------------------------------------------------

/// Log how many fetched rows survived cleaning.
pub fn log_cleaning_summary(table: &str, fetched: usize, kept: usize) {
    let dropped = fetched.saturating_sub(kept);
    let message = format!(
        "Cleaning complete: {}/{} rows kept, {} dropped (missing h3, parent_h3 or probability)",
        kept, fetched, dropped
    );

    if dropped == 0 {
        info(Stage::Aggregate, Some(table), &message);
    } else if kept == 0 {
        error(Stage::Aggregate, Some(table), &message);
    } else {
        warn(Stage::Aggregate, Some(table), &message);
    }
}

/// Log the outcome of the outlier pass.
pub fn log_outlier_summary(corrected: usize, total: usize, low: f64, high: f64) {
    let message = format!(
        "Outlier pass complete: {}/{} cells outside [{}, {}] replaced with parent mean",
        corrected, total, low, high
    );

    if total > 0 && corrected * 2 > total {
        // More than half the cells replaced usually means the model output
        // is on a different scale than the band expects.
        warn(Stage::Aggregate, None, &message);
    } else {
        info(Stage::Aggregate, None, &message);
    }
}
