//! Database connection helpers.
//!
//! One blocking connection per run. `connect_and_verify` fails fast with a
//! readable message when the target database lacks the tables the export
//! reads from, instead of surfacing a raw "relation does not exist" from the
//! first query.

use postgres::{Client, NoTls};

use crate::error::ExportError;
use crate::logging::{self, Stage};

/// Opens a single connection.
pub fn connect(database_url: &str) -> Result<Client, ExportError> {
    let client = Client::connect(database_url, NoTls)?;
    logging::debug(Stage::Database, None, "Connection established");
    Ok(client)
}

/// Connects and checks that every table in `required_tables` resolves.
///
/// Names may be schema-qualified (`public.prediction`); unqualified names
/// resolve through the connection's `search_path`.
pub fn connect_and_verify(database_url: &str, required_tables: &[&str]) -> Result<Client, ExportError> {
    let mut client = connect(database_url)?;
    let missing = missing_tables(&mut client, required_tables)?;
    if !missing.is_empty() {
        return Err(ExportError::MissingTables(missing));
    }
    logging::info(
        Stage::Database,
        None,
        &format!("Connected; verified tables: {}", required_tables.join(", ")),
    );
    Ok(client)
}

/// Returns the subset of `tables` that do not exist.
pub fn missing_tables(client: &mut Client, tables: &[&str]) -> Result<Vec<String>, ExportError> {
    let mut missing = Vec::new();
    for table in tables {
        let row = client.query_one("SELECT to_regclass($1)::text", &[table])?;
        let resolved: Option<String> = row.try_get(0)?;
        if resolved.is_none() {
            missing.push(table.to_string());
        }
    }
    Ok(missing)
}
