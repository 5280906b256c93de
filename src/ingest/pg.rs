//! PostgreSQL-backed prediction source.
//!
//! Reads the prediction table in one query and the newest weather timestamp
//! in a second. Table and column names come from validated configuration
//! (`config::is_sql_identifier`) and are interpolated into the SQL text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Timelike, Utc};
use postgres::Client;
use postgres::types::Type;

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::ingest::PredictionSource;
use crate::logging::{self, Stage};
use crate::model::RawPredictionRow;

pub struct PgSource {
    client: Client,
    prediction_table: String,
    weather_table: String,
    weather_column: String,
}

impl PgSource {
    pub fn new(client: Client, config: &ExportConfig) -> Self {
        Self {
            client,
            prediction_table: config.prediction_table.clone(),
            weather_table: config.weather_table.clone(),
            weather_column: config.weather_column.clone(),
        }
    }

    /// Tables that must exist before the export runs.
    pub fn required_tables(config: &ExportConfig) -> Vec<&str> {
        vec![config.prediction_table.as_str(), config.weather_table.as_str()]
    }
}

/// Bulk prediction query. Rows with a NULL probability are filtered in SQL;
/// NULL keys are filtered during cleaning.
pub fn predictions_sql(table: &str) -> String {
    format!(
        "SELECT
            h3::text              AS h3,
            parent_h3::text       AS parent_h3,
            probability::float8   AS probability
        FROM {}
        WHERE probability IS NOT NULL",
        table
    )
}

/// Latest-timestamp query. `NULLS LAST` keeps a NULL row from shadowing the
/// newest real timestamp under a descending sort.
pub fn latest_weather_sql(table: &str, column: &str) -> String {
    format!(
        "SELECT {col}
        FROM {table}
        ORDER BY {col} DESC NULLS LAST
        LIMIT 1",
        col = column,
        table = table
    )
}

/// `timestamptz` rendering: RFC 3339 with a `+00:00` offset, microseconds
/// only when present.
pub fn format_utc_timestamp(ts: DateTime<Utc>) -> String {
    let precision = if ts.nanosecond() == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    ts.to_rfc3339_opts(precision, false)
}

/// `timestamp without time zone` rendering: no offset suffix.
pub fn format_naive_timestamp(ts: NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

impl PredictionSource for PgSource {
    fn describe(&self) -> String {
        self.prediction_table.clone()
    }

    fn fetch_predictions(&mut self) -> Result<Vec<RawPredictionRow>, ExportError> {
        let rows = self.client.query(predictions_sql(&self.prediction_table).as_str(), &[])?;

        let mut readings = Vec::with_capacity(rows.len());
        for row in rows {
            readings.push(RawPredictionRow {
                h3: row.try_get(0)?,
                parent_h3: row.try_get(1)?,
                probability: row.try_get(2)?,
            });
        }

        logging::debug(
            Stage::Database,
            Some(self.prediction_table.as_str()),
            &format!("Fetched {} rows", readings.len()),
        );
        Ok(readings)
    }

    fn fetch_latest_weather(&mut self) -> Result<Option<String>, ExportError> {
        let sql = latest_weather_sql(&self.weather_table, &self.weather_column);
        let row = match self.client.query_opt(sql.as_str(), &[])? {
            Some(row) => row,
            None => return Ok(None),
        };

        let ty = row.columns()[0].type_().clone();
        let value = if ty == Type::TIMESTAMPTZ {
            row.try_get::<_, Option<DateTime<Utc>>>(0)?.map(format_utc_timestamp)
        } else if ty == Type::TIMESTAMP {
            row.try_get::<_, Option<NaiveDateTime>>(0)?.map(format_naive_timestamp)
        } else if ty == Type::DATE {
            row.try_get::<_, Option<NaiveDate>>(0)?
                .map(|d| d.format("%Y-%m-%d").to_string())
        } else if ty == Type::TEXT || ty == Type::VARCHAR || ty == Type::BPCHAR {
            row.try_get::<_, Option<String>>(0)?
        } else {
            return Err(ExportError::Config(format!(
                "{}.{} has unsupported type {}; expected timestamptz, timestamp, date or text",
                self.weather_table, self.weather_column, ty
            )));
        };

        if value.is_none() {
            logging::warn(
                Stage::Database,
                Some(self.weather_table.as_str()),
                "Latest weather row has a NULL timestamp",
            );
        }
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
