//! Unified read-side over the three record stores: listing, deletion and
//! counts across prescriptions, reports and symptom consultations.

pub mod aggregator;

pub use aggregator::{delete_history_item, history_stats, list_history};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{JobStatus, RecordKind, SortField, SortOrder};

#[derive(Error, Debug)]
pub enum HistoryError {
    /// Covers both "no such record" and "record owned by someone else" —
    /// callers must not be able to distinguish them.
    #[error("Record not found")]
    NotFound,

    #[error("Invalid history query: {0}")]
    InvalidQuery(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// One record projected into the cross-store list shape. Computed at
/// aggregation time, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: Uuid,
    pub kind: RecordKind,
    pub title: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Listing parameters. `page` is 1-based.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub page: u32,
    pub limit: u32,
    pub kind: Option<RecordKind>,
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            kind: None,
            search: None,
            sort_by: SortField::CreatedAt,
            sort_order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub items_per_page: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub items: Vec<HistoryItem>,
    pub pagination: Pagination,
}

/// Per-store counts plus grand total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_analyses: u64,
    pub prescriptions: u64,
    pub reports: u64,
    pub otc_consultations: u64,
}
