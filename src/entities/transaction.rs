// 💸 Transaction Fact - append-only dated events referencing dimensions
//
// A fact carries no natural key. Re-ingesting the same statement appends the
// same facts again; nothing in the schema can tell the copies apart.

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

// ============================================================================
// TRANSACTION KIND
// ============================================================================

/// Direction of money. The stored amount is always non-negative; this is the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Inflow,
    Outflow,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Inflow => "inflow",
            TransactionKind::Outflow => "outflow",
        }
    }

    /// Negative ⇒ outflow, anything else (zero included) ⇒ inflow
    pub fn from_sign(amount: f64) -> Self {
        if amount < 0.0 {
            TransactionKind::Outflow
        } else {
            TransactionKind::Inflow
        }
    }

    /// Parse an explicit kind column, accepting the aliases bank exports use.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "inflow" | "income" | "credit" | "in" | "entrada" | "receita" => {
                Some(TransactionKind::Inflow)
            }
            "outflow" | "expense" | "debit" | "out" | "saida" | "saída" | "despesa" => {
                Some(TransactionKind::Outflow)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "inflow" => Ok(TransactionKind::Inflow),
            "outflow" => Ok(TransactionKind::Outflow),
            other => Err(FromSqlError::Other(
                format!("unknown transaction kind: {}", other).into(),
            )),
        }
    }
}

// ============================================================================
// FACT RECORDS
// ============================================================================

/// Fact tuple ready for insert: natural keys already swapped for surrogate ids
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub date: NaiveDateTime,
    pub description: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub account_id: i64,
    pub category_id: i64,
}

/// Persisted fact row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDateTime,
    pub description: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub account_id: i64,
    pub category_id: i64,
}
