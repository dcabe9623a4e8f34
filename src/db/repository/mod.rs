//! Per-store repositories for the three record tables.
//!
//! All three expose the same surface: insert, get-by-id, finalize (guarded
//! against terminal rows), filtered + sorted + paginated find, count, and
//! owner-checked delete. Queries with a dynamic shape are assembled through
//! `StoreFilter`, numbered placeholders and boxed params.

pub mod prescription;
pub mod report;
pub mod symptom;

pub use prescription::*;
pub use report::*;
pub use symptom::*;

use uuid::Uuid;

use crate::models::enums::{SortField, SortOrder};

/// Builds the shared WHERE suffix (owner scope + optional search) for a
/// store's find/count/delete queries.
pub(crate) struct StoreFilter {
    clauses: Vec<String>,
    params: Vec<Box<dyn rusqlite::types::ToSql>>,
}

impl StoreFilter {
    /// Owner scoping is always present: a concrete owner id, or the guest
    /// rows (owner IS NULL).
    pub(crate) fn for_owner(owner: Option<&Uuid>) -> Self {
        let mut filter = Self {
            clauses: Vec::new(),
            params: Vec::new(),
        };
        match owner {
            Some(id) => {
                filter.params.push(Box::new(id.to_string()));
                filter
                    .clauses
                    .push(format!(" AND owner = ?{}", filter.params.len()));
            }
            None => filter.clauses.push(" AND owner IS NULL".to_string()),
        }
        filter
    }

    /// Case-insensitive substring OR across the given text expressions.
    pub(crate) fn with_search(mut self, columns: &[&str], term: Option<&str>) -> Self {
        let Some(term) = term.filter(|t| !t.trim().is_empty()) else {
            return self;
        };
        let needle = format!("%{}%", term.trim().to_lowercase());
        let mut ors = Vec::new();
        for column in columns {
            self.params.push(Box::new(needle.clone()));
            ors.push(format!("LOWER({column}) LIKE ?{}", self.params.len()));
        }
        self.clauses.push(format!(" AND ({})", ors.join(" OR ")));
        self
    }

    pub(crate) fn sql_suffix(&self) -> String {
        self.clauses.join("")
    }

    pub(crate) fn param_refs(&self) -> Vec<&dyn rusqlite::types::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }

    pub(crate) fn push_param(&mut self, value: Box<dyn rusqlite::types::ToSql>) -> usize {
        self.params.push(value);
        self.params.len()
    }
}

/// Classifies a zero-row guarded UPDATE (`... WHERE id = ? AND status =
/// 'processing'`): the row is either terminal or absent.
pub(crate) fn guarded_update_outcome(
    conn: &rusqlite::Connection,
    table: &str,
    entity_type: &str,
    id: &Uuid,
    rows: usize,
) -> Result<(), crate::db::DatabaseError> {
    use rusqlite::OptionalExtension;

    if rows > 0 {
        return Ok(());
    }
    let exists = conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE id = ?1"),
            rusqlite::params![id.to_string()],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists {
        Err(crate::db::DatabaseError::TerminalJob { id: id.to_string() })
    } else {
        Err(crate::db::DatabaseError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        })
    }
}

/// ORDER BY fragment for a find query. Secondary keys make pagination
/// deterministic when the primary key ties.
pub(crate) fn order_by_sql(sort_by: SortField, sort_order: SortOrder) -> String {
    let dir = match sort_order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    match sort_by {
        SortField::CreatedAt => format!("ORDER BY created_at {dir}, id ASC"),
        SortField::Status => format!("ORDER BY status {dir}, created_at DESC, id ASC"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_scope_uses_placeholder() {
        let owner = Uuid::new_v4();
        let filter = StoreFilter::for_owner(Some(&owner));
        assert_eq!(filter.sql_suffix(), " AND owner = ?1");
        assert_eq!(filter.param_refs().len(), 1);
    }

    #[test]
    fn guest_scope_matches_null_owner() {
        let filter = StoreFilter::for_owner(None);
        assert_eq!(filter.sql_suffix(), " AND owner IS NULL");
        assert!(filter.param_refs().is_empty());
    }

    #[test]
    fn search_builds_or_group_after_owner() {
        let owner = Uuid::new_v4();
        let filter = StoreFilter::for_owner(Some(&owner))
            .with_search(&["medicines", "COALESCE(ocr_text, '')"], Some("Aspirin"));
        let sql = filter.sql_suffix();
        assert!(sql.contains("owner = ?1"));
        assert!(sql.contains("LOWER(medicines) LIKE ?2"));
        assert!(sql.contains("LOWER(COALESCE(ocr_text, '')) LIKE ?3"));
        assert_eq!(filter.param_refs().len(), 3);
    }

    #[test]
    fn blank_search_is_ignored() {
        let filter = StoreFilter::for_owner(None).with_search(&["x"], Some("   "));
        assert_eq!(filter.sql_suffix(), " AND owner IS NULL");
    }

    #[test]
    fn order_by_fragments() {
        assert_eq!(
            order_by_sql(SortField::CreatedAt, SortOrder::Desc),
            "ORDER BY created_at DESC, id ASC"
        );
        assert_eq!(
            order_by_sql(SortField::Status, SortOrder::Asc),
            "ORDER BY status ASC, created_at DESC, id ASC"
        );
    }
}
