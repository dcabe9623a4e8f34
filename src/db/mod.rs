//! SQLite persistence: schema, connection helpers, shared error type.
//!
//! Three independent record stores back the history surface: prescriptions,
//! reports, symptom_consults. Rows never contend across jobs — every write
//! targets a single row by id.

pub mod repository;

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Job {id} is in a terminal state and cannot be modified")]
    TerminalJob { id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Fixed-width timestamp format: lexicographic TEXT order equals
/// chronological order, so ORDER BY created_at needs no parsing.
pub const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.naive_utc().format(TIMESTAMP_FMT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FMT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map(|naive| naive.and_utc())
        .map_err(|e| DatabaseError::Serialization(format!("bad timestamp '{raw}': {e}")))
}

pub fn open(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS prescriptions (
            id TEXT PRIMARY KEY,
            owner TEXT,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            error_message TEXT,
            medicines TEXT NOT NULL DEFAULT '[]',
            ocr_text TEXT,
            image_ref TEXT,
            result TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_prescriptions_owner ON prescriptions(owner);
        CREATE INDEX IF NOT EXISTS idx_prescriptions_created ON prescriptions(created_at);

        CREATE TABLE IF NOT EXISTS reports (
            id TEXT PRIMARY KEY,
            owner TEXT,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            error_message TEXT,
            report_type TEXT NOT NULL,
            report_subtype TEXT NOT NULL,
            type_confidence TEXT NOT NULL,
            analysis_depth TEXT NOT NULL,
            image_ref TEXT,
            result TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_reports_owner ON reports(owner);
        CREATE INDEX IF NOT EXISTS idx_reports_created ON reports(created_at);

        CREATE TABLE IF NOT EXISTS symptom_consults (
            id TEXT PRIMARY KEY,
            owner TEXT,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            error_message TEXT,
            symptom_label TEXT NOT NULL,
            symptoms TEXT NOT NULL DEFAULT '[]',
            custom_symptoms TEXT,
            age_group TEXT NOT NULL,
            result TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_symptom_consults_owner ON symptom_consults(owner);
        CREATE INDEX IF NOT EXISTS idx_symptom_consults_created ON symptom_consults(created_at);",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn schema_is_idempotent() {
        let conn = open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('prescriptions', 'reports', 'symptom_consults')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn timestamp_round_trip() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
            + chrono::Duration::milliseconds(589);
        let text = format_timestamp(&ts);
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }

    #[test]
    fn timestamp_text_order_is_chronological() {
        let early = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        assert!(format_timestamp(&early) < format_timestamp(&late));
    }

    #[test]
    fn legacy_second_precision_parses() {
        let ts = parse_timestamp("2024-06-01 12:00:00").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 0);
    }
}
