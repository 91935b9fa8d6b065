// 🔑 Key Resolver - natural keys → surrogate ids
//
// Two phases, in this order: upsert every distinct key, then reload the full
// dimension tables and build the maps from what the store says. The maps are
// never built from the values that were just written, so keys created by an
// earlier run resolve to their existing ids.

use crate::db;
use crate::entities::{Account, Category, TransactionKind};
use crate::error::{KeyKind, ResolutionError, Result};
use crate::normalize::CanonicalRow;
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

// ============================================================================
// DISTINCT KEYS
// ============================================================================

/// Distinct natural keys in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinctKeys {
    pub accounts: Vec<String>,
    pub categories: Vec<(String, TransactionKind)>,
}

impl DistinctKeys {
    pub fn from_rows(rows: &[CanonicalRow]) -> Self {
        let mut keys = DistinctKeys::default();
        let mut seen_accounts = HashSet::new();
        let mut seen_categories = HashSet::new();

        for row in rows {
            if seen_accounts.insert(row.account.as_str()) {
                keys.accounts.push(row.account.clone());
            }
            if seen_categories.insert((row.category.as_str(), row.kind)) {
                keys.categories.push((row.category.clone(), row.kind));
            }
        }

        keys
    }
}

// ============================================================================
// RESOLUTION MAPS
// ============================================================================

/// Per-run lookup tables. Exact, case-sensitive matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionMaps {
    accounts: HashMap<String, i64>,
    categories: HashMap<String, i64>,
}

impl ResolutionMaps {
    pub fn from_dimensions(accounts: Vec<Account>, categories: Vec<Category>) -> Self {
        ResolutionMaps {
            accounts: accounts.into_iter().map(|a| (a.name, a.id)).collect(),
            categories: categories.into_iter().map(|c| (c.name, c.id)).collect(),
        }
    }

    pub fn account_id(&self, name: &str) -> Option<i64> {
        self.accounts.get(name).copied()
    }

    pub fn category_id(&self, name: &str) -> Option<i64> {
        self.categories.get(name).copied()
    }

    /// Look up both ids for a row, failing on the first missing key
    pub fn resolve_row(&self, row: &CanonicalRow) -> Result<(i64, i64), ResolutionError> {
        let account_id = self.account_id(&row.account).ok_or_else(|| ResolutionError {
            row: row.source_row,
            kind: KeyKind::Account,
            key: row.account.clone(),
        })?;

        let category_id = self.category_id(&row.category).ok_or_else(|| ResolutionError {
            row: row.source_row,
            kind: KeyKind::Category,
            key: row.category.clone(),
        })?;

        Ok((account_id, category_id))
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// What the resolution phase produced
#[derive(Debug, Clone)]
pub struct Resolution {
    pub maps: ResolutionMaps,
    pub accounts_created: usize,
    pub categories_created: usize,
}

#[derive(Debug, Default)]
pub struct KeyResolver;

impl KeyResolver {
    pub fn new() -> Self {
        KeyResolver
    }

    /// Upsert every distinct key, then rebuild the maps from the store.
    ///
    /// Run this on the run's transaction: the upserts are only visible to other
    /// connections once the whole run commits.
    pub fn resolve(&self, conn: &Connection, rows: &[CanonicalRow]) -> Result<Resolution> {
        let keys = DistinctKeys::from_rows(rows);

        // Phase 1: insert-or-ignore
        let mut accounts_created = 0;
        for name in &keys.accounts {
            if db::upsert_account(conn, name)? {
                debug!(account = %name, "created account");
                accounts_created += 1;
            }
        }

        let mut categories_created = 0;
        for (name, kind) in &keys.categories {
            if db::upsert_category(conn, name, *kind)? {
                debug!(category = %name, kind = %kind, "created category");
                categories_created += 1;
            }
        }

        // Phase 2: reload, never trust the inputs
        let maps = ResolutionMaps::from_dimensions(
            db::load_accounts(conn)?,
            db::load_categories(conn)?,
        );

        info!(
            distinct_accounts = keys.accounts.len(),
            distinct_categories = keys.categories.len(),
            accounts_created,
            categories_created,
            "resolved natural keys"
        );

        Ok(Resolution {
            maps,
            accounts_created,
            categories_created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(idx: usize, account: &str, category: &str, kind: TransactionKind) -> CanonicalRow {
        CanonicalRow {
            source_row: idx,
            date: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            description: String::new(),
            amount: 1.0,
            kind,
            account: account.to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn test_distinct_keys_first_seen_order() {
        let rows = vec![
            row(0, "Main", "food", TransactionKind::Outflow),
            row(1, "Card", "food", TransactionKind::Outflow),
            row(2, "Main", "income", TransactionKind::Inflow),
            row(3, "Main", "food", TransactionKind::Inflow),
        ];

        let keys = DistinctKeys::from_rows(&rows);

        assert_eq!(keys.accounts, vec!["Main", "Card"]);
        assert_eq!(
            keys.categories,
            vec![
                ("food".to_string(), TransactionKind::Outflow),
                ("income".to_string(), TransactionKind::Inflow),
                ("food".to_string(), TransactionKind::Inflow),
            ]
        );
    }

    #[test]
    fn test_resolve_builds_complete_maps() {
        let conn = db::open_in_memory().unwrap();
        let rows = vec![
            row(0, "Main", "food", TransactionKind::Outflow),
            row(1, "Main", "income", TransactionKind::Inflow),
        ];

        let resolution = KeyResolver::new().resolve(&conn, &rows).unwrap();

        assert_eq!(resolution.accounts_created, 1);
        assert_eq!(resolution.categories_created, 2);
        for r in &rows {
            assert!(resolution.maps.resolve_row(r).is_ok());
        }
    }

    #[test]
    fn test_resolve_reuses_existing_ids() {
        let conn = db::open_in_memory().unwrap();
        db::upsert_account(&conn, "Older").unwrap();
        db::upsert_account(&conn, "Main").unwrap();
        let existing_main = db::load_accounts(&conn).unwrap()[1].id;

        let rows = vec![row(0, "Main", "food", TransactionKind::Outflow)];
        let resolution = KeyResolver::new().resolve(&conn, &rows).unwrap();

        assert_eq!(resolution.accounts_created, 0);
        assert_eq!(resolution.maps.account_id("Main"), Some(existing_main));
        // Reloaded maps also carry keys this batch never mentioned
        assert!(resolution.maps.account_id("Older").is_some());
        assert_eq!(db::count_accounts(&conn).unwrap(), 2);
    }

    #[test]
    fn test_resolve_row_reports_missing_key() {
        let maps = ResolutionMaps::from_dimensions(
            vec![Account::new(1, "Main")],
            vec![Category::new(1, "food", TransactionKind::Outflow)],
        );

        let err = maps
            .resolve_row(&row(9, "Main", "Food", TransactionKind::Outflow))
            .unwrap_err();

        assert_eq!(err.row, 9);
        assert_eq!(err.kind, KeyKind::Category);
        assert_eq!(err.key, "Food");

        let err = maps
            .resolve_row(&row(3, "main", "food", TransactionKind::Outflow))
            .unwrap_err();
        assert_eq!(err.kind, KeyKind::Account);
    }
}
