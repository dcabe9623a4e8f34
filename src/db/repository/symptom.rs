use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_timestamp, DatabaseError};
use crate::models::enums::{AgeGroup, JobStatus, SortField, SortOrder};
use crate::models::job::SymptomJob;

use super::report::{deserialize_result, parse_uuid, serialize_result};
use super::{guarded_update_outcome, order_by_sql, StoreFilter};

const SEARCH_COLUMNS: &[&str] = &[
    "symptom_label",
    "COALESCE(custom_symptoms, '')",
    "COALESCE(json_extract(result, '$.summary'), '')",
];

const SELECT_COLUMNS: &str = "id, owner, status, created_at, error_message,
     symptom_label, symptoms, custom_symptoms, age_group, result";

pub fn insert_symptom_consult(conn: &Connection, job: &SymptomJob) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO symptom_consults (id, owner, status, created_at, error_message,
         symptom_label, symptoms, custom_symptoms, age_group, result)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            job.id.to_string(),
            job.owner.map(|o| o.to_string()),
            job.status.as_str(),
            format_timestamp(&job.created_at),
            job.error_message,
            job.symptom_label(),
            serde_json::to_string(&job.symptoms)
                .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
            job.custom_symptoms,
            job.age_group.as_str(),
            serialize_result(job.result.as_ref())?,
        ],
    )?;
    Ok(())
}

pub fn get_symptom_consult(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<SymptomJob>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM symptom_consults WHERE id = ?1"
    ))?;
    let row = stmt
        .query_row(params![id.to_string()], map_row)
        .optional()?;
    row.map(symptom_from_row).transpose()
}

pub fn finalize_symptom_consult(conn: &Connection, job: &SymptomJob) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE symptom_consults SET status = ?2, error_message = ?3, result = ?4
         WHERE id = ?1 AND status = 'processing'",
        params![
            job.id.to_string(),
            job.status.as_str(),
            job.error_message,
            serialize_result(job.result.as_ref())?,
        ],
    )?;
    guarded_update_outcome(conn, "symptom_consults", "SymptomJob", &job.id, rows)
}

pub fn find_symptom_consults(
    conn: &Connection,
    owner: Option<&Uuid>,
    search: Option<&str>,
    sort_by: SortField,
    sort_order: SortOrder,
    limit: u32,
    offset: u32,
) -> Result<Vec<SymptomJob>, DatabaseError> {
    let mut filter = StoreFilter::for_owner(owner).with_search(SEARCH_COLUMNS, search);
    let limit_idx = filter.push_param(Box::new(limit));
    let offset_idx = filter.push_param(Box::new(offset));
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM symptom_consults WHERE 1=1{} {} LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
        filter.sql_suffix(),
        order_by_sql(sort_by, sort_order),
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(filter.param_refs().as_slice(), map_row)?;
    let mut jobs = Vec::new();
    for row in rows {
        jobs.push(symptom_from_row(row?)?);
    }
    Ok(jobs)
}

pub fn count_symptom_consults(
    conn: &Connection,
    owner: Option<&Uuid>,
    search: Option<&str>,
) -> Result<u64, DatabaseError> {
    let filter = StoreFilter::for_owner(owner).with_search(SEARCH_COLUMNS, search);
    let sql = format!(
        "SELECT COUNT(*) FROM symptom_consults WHERE 1=1{}",
        filter.sql_suffix()
    );
    let count: i64 = conn.query_row(&sql, filter.param_refs().as_slice(), |row| row.get(0))?;
    Ok(count as u64)
}

/// Owner-checked delete; false covers both missing and not-owned rows.
pub fn delete_symptom_consult(
    conn: &Connection,
    owner: Option<&Uuid>,
    id: &Uuid,
) -> Result<bool, DatabaseError> {
    let mut filter = StoreFilter::for_owner(owner);
    let id_idx = filter.push_param(Box::new(id.to_string()));
    let sql = format!(
        "DELETE FROM symptom_consults WHERE id = ?{id_idx}{}",
        filter.sql_suffix()
    );
    let rows = conn.execute(&sql, filter.param_refs().as_slice())?;
    Ok(rows > 0)
}

// Internal row type for SymptomJob mapping
struct SymptomRow {
    id: String,
    owner: Option<String>,
    status: String,
    created_at: String,
    error_message: Option<String>,
    symptoms: String,
    custom_symptoms: Option<String>,
    age_group: String,
    result: Option<String>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SymptomRow> {
    Ok(SymptomRow {
        id: row.get(0)?,
        owner: row.get(1)?,
        status: row.get(2)?,
        created_at: row.get(3)?,
        error_message: row.get(4)?,
        // symptom_label (index 5) is derived; recomputed from symptoms on load
        symptoms: row.get(6)?,
        custom_symptoms: row.get(7)?,
        age_group: row.get(8)?,
        result: row.get(9)?,
    })
}

fn symptom_from_row(row: SymptomRow) -> Result<SymptomJob, DatabaseError> {
    Ok(SymptomJob {
        id: parse_uuid(&row.id)?,
        owner: row.owner.as_deref().map(parse_uuid).transpose()?,
        status: JobStatus::from_str(&row.status)?,
        created_at: parse_timestamp(&row.created_at)?,
        error_message: row.error_message,
        symptoms: serde_json::from_str(&row.symptoms)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
        custom_symptoms: row.custom_symptoms,
        age_group: AgeGroup::from_str(&row.age_group)?,
        result: deserialize_result(row.result.as_deref())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::db::open_in_memory;
    use crate::models::enums::SymptomType;
    use crate::models::job::RatedSymptom;

    fn sample_job(owner: Option<Uuid>) -> SymptomJob {
        SymptomJob::new(
            owner,
            vec![
                RatedSymptom { symptom: SymptomType::Headache, severity: 4 },
                RatedSymptom { symptom: SymptomType::Fever, severity: 5 },
            ],
            None,
            AgeGroup::Adult,
        )
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_in_memory().unwrap();
        let job = sample_job(Some(Uuid::new_v4()));
        insert_symptom_consult(&conn, &job).unwrap();
        assert_eq!(get_symptom_consult(&conn, &job.id).unwrap().unwrap(), job);
    }

    #[test]
    fn search_matches_symptom_label() {
        let conn = open_in_memory().unwrap();
        insert_symptom_consult(&conn, &sample_job(None)).unwrap();
        assert_eq!(count_symptom_consults(&conn, None, Some("headache")).unwrap(), 1);
        assert_eq!(count_symptom_consults(&conn, None, Some("rash")).unwrap(), 0);
    }

    #[test]
    fn search_matches_custom_symptoms() {
        let conn = open_in_memory().unwrap();
        let job = SymptomJob::new(None, vec![], Some("ringing in ears".into()), AgeGroup::Senior);
        insert_symptom_consult(&conn, &job).unwrap();
        assert_eq!(count_symptom_consults(&conn, None, Some("Ringing")).unwrap(), 1);
    }

    #[test]
    fn finalize_guard_on_terminal_row() {
        let conn = open_in_memory().unwrap();
        let job = sample_job(None);
        insert_symptom_consult(&conn, &job).unwrap();
        finalize_symptom_consult(&conn, &job.clone().failed("timeout".into())).unwrap();

        let err =
            finalize_symptom_consult(&conn, &job.failed("again".into())).unwrap_err();
        assert!(matches!(err, DatabaseError::TerminalJob { .. }));
    }

    #[test]
    fn owner_scope_isolates_rows() {
        let conn = open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        insert_symptom_consult(&conn, &sample_job(Some(owner))).unwrap();
        insert_symptom_consult(&conn, &sample_job(None)).unwrap();

        assert_eq!(count_symptom_consults(&conn, Some(&owner), None).unwrap(), 1);
        assert_eq!(count_symptom_consults(&conn, None, None).unwrap(), 1);
    }
}
