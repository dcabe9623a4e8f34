//! Cross-store listing, deletion and counts.
//!
//! With a kind filter the query is pushed down to that store unchanged.
//! Without one, each store contributes a bounded window of `skip + limit`
//! rows fetched under the same ordering, which is a superset of any rows
//! the merged page can contain — so merging, sorting and slicing those
//! windows yields exactly the full-merge-then-paginate result without
//! loading whole tables.

use std::cmp::Ordering;

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository;
use crate::models::enums::{RecordKind, ReportType, SortField, SortOrder};
use crate::models::job::{PrescriptionJob, ReportJob, SymptomJob, UNKNOWN_SUBTYPE};

use super::{HistoryError, HistoryItem, HistoryPage, HistoryQuery, HistoryStats, Pagination};

/// List one page of records across the stores.
pub fn list_history(
    conn: &Connection,
    owner: Option<&Uuid>,
    query: &HistoryQuery,
) -> Result<HistoryPage, HistoryError> {
    if query.page == 0 {
        return Err(HistoryError::InvalidQuery("page numbering starts at 1".into()));
    }
    if query.limit == 0 {
        return Err(HistoryError::InvalidQuery("limit must be at least 1".into()));
    }
    let skip = (query.page - 1).saturating_mul(query.limit);
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let (items, total_items) = match query.kind {
        Some(kind) => single_store_page(conn, owner, kind, search, query, skip)?,
        None => merged_page(conn, owner, search, query, skip)?,
    };

    let total_pages = total_items.div_ceil(u64::from(query.limit)) as u32;
    tracing::debug!(
        page = query.page,
        returned = items.len(),
        total_items,
        "History page assembled"
    );
    Ok(HistoryPage {
        items,
        pagination: Pagination {
            current_page: query.page,
            total_pages,
            total_items,
            items_per_page: query.limit,
            has_next_page: query.page < total_pages,
            has_prev_page: query.page > 1,
        },
    })
}

fn single_store_page(
    conn: &Connection,
    owner: Option<&Uuid>,
    kind: RecordKind,
    search: Option<&str>,
    query: &HistoryQuery,
    skip: u32,
) -> Result<(Vec<HistoryItem>, u64), HistoryError> {
    let (items, total) = match kind {
        RecordKind::Prescription => (
            repository::find_prescriptions(
                conn, owner, search, query.sort_by, query.sort_order, query.limit, skip,
            )?
            .into_iter()
            .map(prescription_item)
            .collect(),
            repository::count_prescriptions(conn, owner, search)?,
        ),
        RecordKind::Report => (
            repository::find_reports(
                conn, owner, search, query.sort_by, query.sort_order, query.limit, skip,
            )?
            .into_iter()
            .map(report_item)
            .collect(),
            repository::count_reports(conn, owner, search)?,
        ),
        RecordKind::Otc => (
            repository::find_symptom_consults(
                conn, owner, search, query.sort_by, query.sort_order, query.limit, skip,
            )?
            .into_iter()
            .map(symptom_item)
            .collect(),
            repository::count_symptom_consults(conn, owner, search)?,
        ),
    };
    Ok((items, total))
}

fn merged_page(
    conn: &Connection,
    owner: Option<&Uuid>,
    search: Option<&str>,
    query: &HistoryQuery,
    skip: u32,
) -> Result<(Vec<HistoryItem>, u64), HistoryError> {
    let window = skip.saturating_add(query.limit);

    // The stable sort keeps each store's SQL ordering for full ties;
    // cross-store ties are broken by merge rank in compare_items.
    let mut items: Vec<HistoryItem> = Vec::new();
    items.extend(
        repository::find_prescriptions(
            conn, owner, search, query.sort_by, query.sort_order, window, 0,
        )?
        .into_iter()
        .map(prescription_item),
    );
    items.extend(
        repository::find_reports(conn, owner, search, query.sort_by, query.sort_order, window, 0)?
            .into_iter()
            .map(report_item),
    );
    items.extend(
        repository::find_symptom_consults(
            conn, owner, search, query.sort_by, query.sort_order, window, 0,
        )?
        .into_iter()
        .map(symptom_item),
    );

    items.sort_by(|a, b| compare_items(a, b, query.sort_by, query.sort_order));
    let start = (skip as usize).min(items.len());
    let end = (start + query.limit as usize).min(items.len());
    let page = items[start..end].to_vec();

    let total = repository::count_prescriptions(conn, owner, search)?
        + repository::count_reports(conn, owner, search)?
        + repository::count_symptom_consults(conn, owner, search)?;
    Ok((page, total))
}

/// Mirrors the stores' ORDER BY clauses so window-merge and full-merge
/// agree: status sorts carry a fixed newest-first secondary key.
fn compare_items(a: &HistoryItem, b: &HistoryItem, sort_by: SortField, order: SortOrder) -> Ordering {
    let directed = |ord: Ordering| match order {
        SortOrder::Asc => ord,
        SortOrder::Desc => ord.reverse(),
    };
    let ranked = |ord: Ordering| ord.then_with(|| a.kind.merge_rank().cmp(&b.kind.merge_rank()));
    match sort_by {
        SortField::CreatedAt => ranked(directed(a.created_at.cmp(&b.created_at))),
        SortField::Status => ranked(
            directed(a.status.as_str().cmp(b.status.as_str()))
                .then_with(|| b.created_at.cmp(&a.created_at)),
        ),
    }
}

/// Delete one record, checking ownership in the same query. "Not found" and
/// "not owned" are indistinguishable to the caller.
pub fn delete_history_item(
    conn: &Connection,
    owner: Option<&Uuid>,
    id: &Uuid,
    kind: RecordKind,
) -> Result<(), HistoryError> {
    let deleted = match kind {
        RecordKind::Prescription => repository::delete_prescription(conn, owner, id)?,
        RecordKind::Report => repository::delete_report(conn, owner, id)?,
        RecordKind::Otc => repository::delete_symptom_consult(conn, owner, id)?,
    };
    if deleted {
        tracing::info!(%id, kind = %kind, "History record deleted");
        Ok(())
    } else {
        Err(HistoryError::NotFound)
    }
}

/// Per-store counts plus grand total, without any merge.
pub fn history_stats(conn: &Connection, owner: Option<&Uuid>) -> Result<HistoryStats, HistoryError> {
    let prescriptions = repository::count_prescriptions(conn, owner, None)?;
    let reports = repository::count_reports(conn, owner, None)?;
    let otc_consultations = repository::count_symptom_consults(conn, owner, None)?;
    Ok(HistoryStats {
        total_analyses: prescriptions + reports + otc_consultations,
        prescriptions,
        reports,
        otc_consultations,
    })
}

// ── Projection ─────────────────────────────────────────────────────────────

fn prescription_item(job: PrescriptionJob) -> HistoryItem {
    let title = if job.medicines.is_empty() {
        "Prescription".to_string()
    } else {
        job.medicines.join(", ")
    };
    HistoryItem {
        id: job.id,
        kind: RecordKind::Prescription,
        title,
        status: job.status,
        created_at: job.created_at,
        image_url: job.image_ref,
    }
}

fn report_item(job: ReportJob) -> HistoryItem {
    let title = if job.report_subtype != UNKNOWN_SUBTYPE {
        job.report_subtype.clone()
    } else {
        match job.report_type {
            ReportType::BloodTest => "Blood test".to_string(),
            ReportType::Radiology => "Radiology report".to_string(),
            ReportType::Pathology => "Pathology report".to_string(),
            ReportType::Other => "Medical document".to_string(),
        }
    };
    HistoryItem {
        id: job.id,
        kind: RecordKind::Report,
        title,
        status: job.status,
        created_at: job.created_at,
        image_url: job.image_ref,
    }
}

fn symptom_item(job: SymptomJob) -> HistoryItem {
    HistoryItem {
        id: job.id,
        kind: RecordKind::Otc,
        title: job.symptom_label(),
        status: job.status,
        created_at: job.created_at,
        image_url: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::db;
    use crate::models::enums::{AgeGroup, AnalysisDepth, JobStatus, SymptomType};
    use crate::models::job::RatedSymptom;
    use crate::models::result::{AnalysisResult, ResultBase, ResultDetail};

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap() + Duration::seconds(offset_secs)
    }

    fn result(summary: &str) -> AnalysisResult {
        AnalysisResult {
            base: ResultBase {
                summary: summary.to_string(),
                ..Default::default()
            },
            detail: ResultDetail::General {},
        }
    }

    fn add_prescription(
        conn: &Connection,
        owner: Option<Uuid>,
        at: DateTime<Utc>,
        medicines: &[&str],
    ) -> Uuid {
        let mut job = PrescriptionJob::new(
            owner,
            medicines.iter().map(|m| m.to_string()).collect(),
            Some("ocr text".into()),
        );
        job.created_at = at;
        let job = job.completed(result("prescription summary"));
        repository::insert_prescription(conn, &job).unwrap();
        job.id
    }

    fn add_report(conn: &Connection, owner: Option<Uuid>, at: DateTime<Utc>, subtype: &str) -> Uuid {
        let mut job = ReportJob::new(owner, AnalysisDepth::Simple, None).classified(
            ReportType::BloodTest,
            subtype.into(),
            crate::models::enums::ConfidenceLevel::High,
        );
        job.created_at = at;
        let job = job.completed(result("report summary"));
        repository::insert_report(conn, &job).unwrap();
        job.id
    }

    fn add_symptom(conn: &Connection, owner: Option<Uuid>, at: DateTime<Utc>) -> Uuid {
        let mut job = SymptomJob::new(
            owner,
            vec![RatedSymptom { symptom: SymptomType::Headache, severity: 3 }],
            Some("itchy eyes".into()),
            AgeGroup::Adult,
        );
        job.created_at = at;
        let job = job.completed(result("symptom summary"));
        repository::insert_symptom_consult(conn, &job).unwrap();
        job.id
    }

    #[test]
    fn second_page_of_mixed_records() {
        let conn = db::open_in_memory().unwrap();
        let owner = Uuid::new_v4();

        // 3 prescriptions, then 2 reports, then 1 consult, strictly newer
        let oldest = add_prescription(&conn, Some(owner), ts(0), &["Amoxicillin"]);
        add_prescription(&conn, Some(owner), ts(1), &["Ibuprofen"]);
        add_prescription(&conn, Some(owner), ts(2), &["Cetirizine"]);
        add_report(&conn, Some(owner), ts(3), "CBC");
        add_report(&conn, Some(owner), ts(4), "Lipid panel");
        add_symptom(&conn, Some(owner), ts(5));

        let page = list_history(
            &conn,
            Some(&owner),
            &HistoryQuery { page: 2, limit: 5, ..Default::default() },
        )
        .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, oldest);
        assert_eq!(
            page.pagination,
            Pagination {
                current_page: 2,
                total_pages: 2,
                total_items: 6,
                items_per_page: 5,
                has_next_page: false,
                has_prev_page: true,
            }
        );
    }

    #[test]
    fn merged_listing_interleaves_stores_by_time() {
        let conn = db::open_in_memory().unwrap();
        let p = add_prescription(&conn, None, ts(0), &["Amoxicillin"]);
        let s = add_symptom(&conn, None, ts(1));
        let r = add_report(&conn, None, ts(2), "CBC");

        let page = list_history(&conn, None, &HistoryQuery::default()).unwrap();
        let ids: Vec<Uuid> = page.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![r, s, p]);

        let asc = list_history(
            &conn,
            None,
            &HistoryQuery { sort_order: SortOrder::Asc, ..Default::default() },
        )
        .unwrap();
        let ids: Vec<Uuid> = asc.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![p, s, r]);
    }

    #[test]
    fn identical_timestamps_break_ties_by_store_rank() {
        let conn = db::open_in_memory().unwrap();
        let p = add_prescription(&conn, None, ts(0), &["Amoxicillin"]);
        let r = add_report(&conn, None, ts(0), "CBC");
        let s = add_symptom(&conn, None, ts(0));

        let page = list_history(&conn, None, &HistoryQuery::default()).unwrap();
        let kinds: Vec<RecordKind> = page.items.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![RecordKind::Prescription, RecordKind::Report, RecordKind::Otc]);
        let ids: Vec<Uuid> = page.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![p, r, s]);
    }

    #[test]
    fn kind_filter_delegates_to_one_store() {
        let conn = db::open_in_memory().unwrap();
        add_prescription(&conn, None, ts(0), &["Amoxicillin"]);
        add_report(&conn, None, ts(1), "CBC");
        add_report(&conn, None, ts(2), "Lipid panel");

        let page = list_history(
            &conn,
            None,
            &HistoryQuery { kind: Some(RecordKind::Report), ..Default::default() },
        )
        .unwrap();
        assert_eq!(page.pagination.total_items, 2);
        assert!(page.items.iter().all(|i| i.kind == RecordKind::Report));
    }

    #[test]
    fn search_spans_type_specific_fields() {
        let conn = db::open_in_memory().unwrap();
        let p = add_prescription(&conn, None, ts(0), &["Amoxicillin 500mg"]);
        let r = add_report(&conn, None, ts(1), "Lipid panel");
        let s = add_symptom(&conn, None, ts(2)); // custom text "itchy eyes"

        for (needle, expected) in [("amox", p), ("lipid", r), ("ITCHY", s)] {
            let page = list_history(
                &conn,
                None,
                &HistoryQuery { search: Some(needle.into()), ..Default::default() },
            )
            .unwrap();
            assert_eq!(page.items.len(), 1, "search '{needle}'");
            assert_eq!(page.items[0].id, expected, "search '{needle}'");
            assert_eq!(page.pagination.total_items, 1);
        }
    }

    #[test]
    fn owner_scoping_separates_users_and_guests() {
        let conn = db::open_in_memory().unwrap();
        let alice = Uuid::new_v4();
        add_prescription(&conn, Some(alice), ts(0), &["Amoxicillin"]);
        let guest_record = add_report(&conn, None, ts(1), "CBC");

        let alice_page = list_history(&conn, Some(&alice), &HistoryQuery::default()).unwrap();
        assert_eq!(alice_page.pagination.total_items, 1);
        assert_eq!(alice_page.items[0].kind, RecordKind::Prescription);

        let guest_page = list_history(&conn, None, &HistoryQuery::default()).unwrap();
        assert_eq!(guest_page.pagination.total_items, 1);
        assert_eq!(guest_page.items[0].id, guest_record);
    }

    #[test]
    fn titles_project_from_store_fields() {
        let conn = db::open_in_memory().unwrap();
        add_prescription(&conn, None, ts(0), &["Amoxicillin", "Ibuprofen"]);
        add_report(&conn, None, ts(1), "CBC");
        add_symptom(&conn, None, ts(2));

        let page = list_history(
            &conn,
            None,
            &HistoryQuery { sort_order: SortOrder::Asc, ..Default::default() },
        )
        .unwrap();
        let titles: Vec<&str> = page.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Amoxicillin, Ibuprofen", "CBC", "Headache"]);
        assert!(page.items.iter().all(|i| i.status == JobStatus::Completed));
    }

    #[test]
    fn unknown_subtype_falls_back_to_type_title() {
        let mut job = ReportJob::new(None, AnalysisDepth::Simple, None);
        job.report_type = ReportType::Radiology;
        assert_eq!(report_item(job).title, "Radiology report");
    }

    #[test]
    fn invalid_page_and_limit_are_rejected() {
        let conn = db::open_in_memory().unwrap();
        let err = list_history(&conn, None, &HistoryQuery { page: 0, ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, HistoryError::InvalidQuery(_)));
        let err = list_history(&conn, None, &HistoryQuery { limit: 0, ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, HistoryError::InvalidQuery(_)));
    }

    #[test]
    fn delete_checks_ownership_without_leaking_existence() {
        let conn = db::open_in_memory().unwrap();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let id = add_report(&conn, Some(alice), ts(0), "CBC");

        // someone else's record and a random id fail identically
        let not_owned = delete_history_item(&conn, Some(&bob), &id, RecordKind::Report);
        let missing =
            delete_history_item(&conn, Some(&bob), &Uuid::new_v4(), RecordKind::Report);
        assert!(matches!(not_owned, Err(HistoryError::NotFound)));
        assert!(matches!(missing, Err(HistoryError::NotFound)));

        delete_history_item(&conn, Some(&alice), &id, RecordKind::Report).unwrap();
        assert!(repository::get_report(&conn, &id).unwrap().is_none());
    }

    #[test]
    fn stats_count_each_store_independently() {
        let conn = db::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        add_prescription(&conn, Some(owner), ts(0), &["Amoxicillin"]);
        add_prescription(&conn, Some(owner), ts(1), &["Ibuprofen"]);
        add_report(&conn, Some(owner), ts(2), "CBC");
        add_symptom(&conn, None, ts(3)); // guest record, excluded

        let stats = history_stats(&conn, Some(&owner)).unwrap();
        assert_eq!(
            stats,
            HistoryStats {
                total_analyses: 3,
                prescriptions: 2,
                reports: 1,
                otc_consultations: 0,
            }
        );
    }

    #[test]
    fn empty_history_has_zero_pages() {
        let conn = db::open_in_memory().unwrap();
        let page = list_history(&conn, None, &HistoryQuery::default()).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.pagination.total_pages, 0);
        assert!(!page.pagination.has_next_page);
        assert!(!page.pagination.has_prev_page);
    }
}
