// 🗄️ Relational Store - SQLite schema, dimension upserts, fact inserts
//
// Every function takes a `&Connection`; a `rusqlite::Transaction` derefs to one,
// so the pipeline runs all of these inside its single run transaction.

use crate::entities::{Account, Category, NewTransaction, Transaction, TransactionKind};
use rusqlite::{params, params_from_iter, types::ToSql, Connection};
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a file-backed store with WAL, foreign keys and the schema in place
pub fn open_database(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    // Wait on other writers before touching the journal mode
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // Enable WAL mode for crash recovery
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    configure(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    setup_database(conn)
}

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // ==========================================================================
    // Dimension tables
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('inflow', 'outflow'))
        )",
        [],
    )?;

    // ==========================================================================
    // Fact table (append-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            amount NUMERIC NOT NULL CHECK (amount >= 0),
            kind TEXT NOT NULL CHECK (kind IN ('inflow', 'outflow')),
            account_id INTEGER NOT NULL REFERENCES accounts(id),
            category_id INTEGER NOT NULL REFERENCES categories(id),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// DIMENSIONS
// ============================================================================

/// Insert-or-ignore on the unique name. Returns true when a row was created.
pub fn upsert_account(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO accounts (name) VALUES (?1)
         ON CONFLICT(name) DO NOTHING",
    )?;
    Ok(stmt.execute(params![name])? == 1)
}

/// Insert-or-ignore on the unique name; an existing row keeps its original kind.
pub fn upsert_category(
    conn: &Connection,
    name: &str,
    kind: TransactionKind,
) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO categories (name, kind) VALUES (?1, ?2)
         ON CONFLICT(name) DO NOTHING",
    )?;
    Ok(stmt.execute(params![name, kind])? == 1)
}

pub fn load_accounts(conn: &Connection) -> rusqlite::Result<Vec<Account>> {
    let mut stmt = conn.prepare("SELECT id, name FROM accounts ORDER BY id")?;

    let accounts = stmt
        .query_map([], |row| {
            Ok(Account {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(accounts)
}

pub fn load_categories(conn: &Connection) -> rusqlite::Result<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name, kind FROM categories ORDER BY id")?;

    let categories = stmt
        .query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                kind: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(categories)
}

// ============================================================================
// FACTS
// ============================================================================

fn insert_sql(rows: usize) -> String {
    let placeholders = vec!["(?, ?, ?, ?, ?, ?)"; rows].join(", ");
    format!(
        "INSERT INTO transactions (date, description, amount, kind, account_id, category_id)
         VALUES {}",
        placeholders
    )
}

/// Insert one chunk of facts with a single multi-row statement.
pub fn insert_transactions(conn: &Connection, chunk: &[NewTransaction]) -> rusqlite::Result<usize> {
    if chunk.is_empty() {
        return Ok(0);
    }

    let mut values: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() * 6);
    for tx in chunk {
        values.push(&tx.date);
        values.push(&tx.description);
        values.push(&tx.amount);
        values.push(&tx.kind);
        values.push(&tx.account_id);
        values.push(&tx.category_id);
    }

    let mut stmt = conn.prepare_cached(&insert_sql(chunk.len()))?;
    stmt.execute(params_from_iter(values))
}

pub fn get_all_transactions(conn: &Connection) -> rusqlite::Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, description, amount, kind, account_id, category_id
         FROM transactions
         ORDER BY id",
    )?;

    let transactions = stmt
        .query_map([], |row| {
            Ok(Transaction {
                id: row.get(0)?,
                date: row.get(1)?,
                description: row.get(2)?,
                amount: row.get(3)?,
                kind: row.get(4)?,
                account_id: row.get(5)?,
                category_id: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

// ============================================================================
// COUNTS
// ============================================================================

fn count(conn: &Connection, table: &str) -> rusqlite::Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
}

pub fn count_accounts(conn: &Connection) -> rusqlite::Result<i64> {
    count(conn, "accounts")
}

pub fn count_categories(conn: &Connection) -> rusqlite::Result<i64> {
    count(conn, "categories")
}

pub fn count_transactions(conn: &Connection) -> rusqlite::Result<i64> {
    count(conn, "transactions")
}

/// Facts whose account or category id has no dimension row
pub fn count_dangling_references(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM transactions t
         LEFT JOIN accounts a ON a.id = t.account_id
         LEFT JOIN categories c ON c.id = t.category_id
         WHERE a.id IS NULL OR c.id IS NULL",
        [],
        |row| row.get(0),
    )
}
