use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_timestamp, DatabaseError};
use crate::models::enums::{JobStatus, SortField, SortOrder};
use crate::models::job::PrescriptionJob;

use super::report::{deserialize_result, parse_uuid, serialize_result};
use super::{guarded_update_outcome, order_by_sql, StoreFilter};

/// Medicines are stored as a JSON array in TEXT, so a LIKE over the column
/// is a substring search across every medicine name.
const SEARCH_COLUMNS: &[&str] = &["medicines", "COALESCE(ocr_text, '')"];

const SELECT_COLUMNS: &str =
    "id, owner, status, created_at, error_message, medicines, ocr_text, image_ref, result";

pub fn insert_prescription(conn: &Connection, job: &PrescriptionJob) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, owner, status, created_at, error_message,
         medicines, ocr_text, image_ref, result)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            job.id.to_string(),
            job.owner.map(|o| o.to_string()),
            job.status.as_str(),
            format_timestamp(&job.created_at),
            job.error_message,
            serde_json::to_string(&job.medicines)
                .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
            job.ocr_text,
            job.image_ref,
            serialize_result(job.result.as_ref())?,
        ],
    )?;
    Ok(())
}

pub fn get_prescription(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<PrescriptionJob>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM prescriptions WHERE id = ?1"
    ))?;
    let row = stmt
        .query_row(params![id.to_string()], map_row)
        .optional()?;
    row.map(prescription_from_row).transpose()
}

pub fn finalize_prescription(
    conn: &Connection,
    job: &PrescriptionJob,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE prescriptions SET status = ?2, error_message = ?3, medicines = ?4,
         ocr_text = ?5, result = ?6
         WHERE id = ?1 AND status = 'processing'",
        params![
            job.id.to_string(),
            job.status.as_str(),
            job.error_message,
            serde_json::to_string(&job.medicines)
                .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
            job.ocr_text,
            serialize_result(job.result.as_ref())?,
        ],
    )?;
    guarded_update_outcome(conn, "prescriptions", "PrescriptionJob", &job.id, rows)
}

pub fn find_prescriptions(
    conn: &Connection,
    owner: Option<&Uuid>,
    search: Option<&str>,
    sort_by: SortField,
    sort_order: SortOrder,
    limit: u32,
    offset: u32,
) -> Result<Vec<PrescriptionJob>, DatabaseError> {
    let mut filter = StoreFilter::for_owner(owner).with_search(SEARCH_COLUMNS, search);
    let limit_idx = filter.push_param(Box::new(limit));
    let offset_idx = filter.push_param(Box::new(offset));
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM prescriptions WHERE 1=1{} {} LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
        filter.sql_suffix(),
        order_by_sql(sort_by, sort_order),
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(filter.param_refs().as_slice(), map_row)?;
    let mut jobs = Vec::new();
    for row in rows {
        jobs.push(prescription_from_row(row?)?);
    }
    Ok(jobs)
}

pub fn count_prescriptions(
    conn: &Connection,
    owner: Option<&Uuid>,
    search: Option<&str>,
) -> Result<u64, DatabaseError> {
    let filter = StoreFilter::for_owner(owner).with_search(SEARCH_COLUMNS, search);
    let sql = format!(
        "SELECT COUNT(*) FROM prescriptions WHERE 1=1{}",
        filter.sql_suffix()
    );
    let count: i64 = conn.query_row(&sql, filter.param_refs().as_slice(), |row| row.get(0))?;
    Ok(count as u64)
}

/// Owner-checked delete; false covers both missing and not-owned rows.
pub fn delete_prescription(
    conn: &Connection,
    owner: Option<&Uuid>,
    id: &Uuid,
) -> Result<bool, DatabaseError> {
    let mut filter = StoreFilter::for_owner(owner);
    let id_idx = filter.push_param(Box::new(id.to_string()));
    let sql = format!(
        "DELETE FROM prescriptions WHERE id = ?{id_idx}{}",
        filter.sql_suffix()
    );
    let rows = conn.execute(&sql, filter.param_refs().as_slice())?;
    Ok(rows > 0)
}

// Internal row type for PrescriptionJob mapping
struct PrescriptionRow {
    id: String,
    owner: Option<String>,
    status: String,
    created_at: String,
    error_message: Option<String>,
    medicines: String,
    ocr_text: Option<String>,
    image_ref: Option<String>,
    result: Option<String>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PrescriptionRow> {
    Ok(PrescriptionRow {
        id: row.get(0)?,
        owner: row.get(1)?,
        status: row.get(2)?,
        created_at: row.get(3)?,
        error_message: row.get(4)?,
        medicines: row.get(5)?,
        ocr_text: row.get(6)?,
        image_ref: row.get(7)?,
        result: row.get(8)?,
    })
}

fn prescription_from_row(row: PrescriptionRow) -> Result<PrescriptionJob, DatabaseError> {
    Ok(PrescriptionJob {
        id: parse_uuid(&row.id)?,
        owner: row.owner.as_deref().map(parse_uuid).transpose()?,
        status: JobStatus::from_str(&row.status)?,
        created_at: parse_timestamp(&row.created_at)?,
        error_message: row.error_message,
        medicines: serde_json::from_str(&row.medicines)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
        ocr_text: row.ocr_text,
        image_ref: row.image_ref,
        result: deserialize_result(row.result.as_deref())?,
    })
}
