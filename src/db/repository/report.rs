use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_timestamp, DatabaseError};
use crate::models::enums::{
    AnalysisDepth, ConfidenceLevel, JobStatus, ReportType, SortField, SortOrder,
};
use crate::models::job::ReportJob;
use crate::models::result::AnalysisResult;

use super::{guarded_update_outcome, order_by_sql, StoreFilter};

/// Text expressions searched for report records.
const SEARCH_COLUMNS: &[&str] = &[
    "report_type",
    "report_subtype",
    "COALESCE(json_extract(result, '$.summary'), '')",
];

const SELECT_COLUMNS: &str = "id, owner, status, created_at, error_message,
     report_type, report_subtype, type_confidence, analysis_depth, image_ref, result";

pub fn insert_report(conn: &Connection, job: &ReportJob) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO reports (id, owner, status, created_at, error_message,
         report_type, report_subtype, type_confidence, analysis_depth, image_ref, result)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            job.id.to_string(),
            job.owner.map(|o| o.to_string()),
            job.status.as_str(),
            format_timestamp(&job.created_at),
            job.error_message,
            job.report_type.as_str(),
            job.report_subtype,
            job.type_confidence.as_str(),
            job.analysis_depth.as_str(),
            job.image_ref,
            serialize_result(job.result.as_ref())?,
        ],
    )?;
    Ok(())
}

pub fn get_report(conn: &Connection, id: &Uuid) -> Result<Option<ReportJob>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM reports WHERE id = ?1"
    ))?;
    let row = stmt
        .query_row(params![id.to_string()], map_row)
        .optional()?;
    row.map(report_from_row).transpose()
}

/// Persist the classifier's detected type. A partial, non-terminal write:
/// refused once the job is terminal.
pub fn attach_classification(
    conn: &Connection,
    id: &Uuid,
    report_type: ReportType,
    subtype: &str,
    confidence: ConfidenceLevel,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE reports SET report_type = ?2, report_subtype = ?3, type_confidence = ?4
         WHERE id = ?1 AND status = 'processing'",
        params![
            id.to_string(),
            report_type.as_str(),
            subtype,
            confidence.as_str()
        ],
    )?;
    guarded_update_outcome(conn, "reports", "ReportJob", id, rows)
}

/// Write the terminal status, error message and result. Refused if the row
/// already reached a terminal status.
pub fn finalize_report(conn: &Connection, job: &ReportJob) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE reports SET status = ?2, error_message = ?3, result = ?4
         WHERE id = ?1 AND status = 'processing'",
        params![
            job.id.to_string(),
            job.status.as_str(),
            job.error_message,
            serialize_result(job.result.as_ref())?,
        ],
    )?;
    guarded_update_outcome(conn, "reports", "ReportJob", &job.id, rows)
}

pub fn find_reports(
    conn: &Connection,
    owner: Option<&Uuid>,
    search: Option<&str>,
    sort_by: SortField,
    sort_order: SortOrder,
    limit: u32,
    offset: u32,
) -> Result<Vec<ReportJob>, DatabaseError> {
    let mut filter = StoreFilter::for_owner(owner).with_search(SEARCH_COLUMNS, search);
    let limit_idx = filter.push_param(Box::new(limit));
    let offset_idx = filter.push_param(Box::new(offset));
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM reports WHERE 1=1{} {} LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
        filter.sql_suffix(),
        order_by_sql(sort_by, sort_order),
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(filter.param_refs().as_slice(), map_row)?;
    let mut jobs = Vec::new();
    for row in rows {
        jobs.push(report_from_row(row?)?);
    }
    Ok(jobs)
}

pub fn count_reports(
    conn: &Connection,
    owner: Option<&Uuid>,
    search: Option<&str>,
) -> Result<u64, DatabaseError> {
    let filter = StoreFilter::for_owner(owner).with_search(SEARCH_COLUMNS, search);
    let sql = format!(
        "SELECT COUNT(*) FROM reports WHERE 1=1{}",
        filter.sql_suffix()
    );
    let count: i64 = conn.query_row(&sql, filter.param_refs().as_slice(), |row| row.get(0))?;
    Ok(count as u64)
}

/// Owner-checked delete. Returns false for both "not found" and "found but
/// not owned" — callers must not distinguish.
pub fn delete_report(
    conn: &Connection,
    owner: Option<&Uuid>,
    id: &Uuid,
) -> Result<bool, DatabaseError> {
    let mut filter = StoreFilter::for_owner(owner);
    let id_idx = filter.push_param(Box::new(id.to_string()));
    let sql = format!(
        "DELETE FROM reports WHERE id = ?{id_idx}{}",
        filter.sql_suffix()
    );
    let rows = conn.execute(&sql, filter.param_refs().as_slice())?;
    Ok(rows > 0)
}

// Internal row type for ReportJob mapping
struct ReportRow {
    id: String,
    owner: Option<String>,
    status: String,
    created_at: String,
    error_message: Option<String>,
    report_type: String,
    report_subtype: String,
    type_confidence: String,
    analysis_depth: String,
    image_ref: Option<String>,
    result: Option<String>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        owner: row.get(1)?,
        status: row.get(2)?,
        created_at: row.get(3)?,
        error_message: row.get(4)?,
        report_type: row.get(5)?,
        report_subtype: row.get(6)?,
        type_confidence: row.get(7)?,
        analysis_depth: row.get(8)?,
        image_ref: row.get(9)?,
        result: row.get(10)?,
    })
}

fn report_from_row(row: ReportRow) -> Result<ReportJob, DatabaseError> {
    Ok(ReportJob {
        id: parse_uuid(&row.id)?,
        owner: row.owner.as_deref().map(parse_uuid).transpose()?,
        status: JobStatus::from_str(&row.status)?,
        created_at: parse_timestamp(&row.created_at)?,
        error_message: row.error_message,
        report_type: ReportType::from_str(&row.report_type)?,
        report_subtype: row.report_subtype,
        type_confidence: ConfidenceLevel::from_str(&row.type_confidence)?,
        analysis_depth: AnalysisDepth::from_str(&row.analysis_depth)?,
        image_ref: row.image_ref,
        result: deserialize_result(row.result.as_deref())?,
    })
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::Serialization(format!("bad uuid '{raw}': {e}")))
}

pub(crate) fn serialize_result(
    result: Option<&AnalysisResult>,
) -> Result<Option<String>, DatabaseError> {
    result
        .map(|r| serde_json::to_string(r).map_err(|e| DatabaseError::Serialization(e.to_string())))
        .transpose()
}

pub(crate) fn deserialize_result(
    raw: Option<&str>,
) -> Result<Option<AnalysisResult>, DatabaseError> {
    raw.map(|text| {
        serde_json::from_str(text).map_err(|e| DatabaseError::Serialization(e.to_string()))
    })
    .transpose()
}
