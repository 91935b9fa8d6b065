// 🏷️ Category Dimension
// Keyed by name; `kind` records the direction seen when the category was first created.

use super::transaction::TransactionKind;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    /// Surrogate key assigned by the store
    pub id: i64,

    /// Natural key, unique, already lower-cased by the normalizer
    pub name: String,

    /// Typical direction of money for this category
    pub kind: TransactionKind,
}

impl Category {
    pub fn new(id: i64, name: impl Into<String>, kind: TransactionKind) -> Self {
        Category {
            id,
            name: name.into(),
            kind,
        }
    }
}
