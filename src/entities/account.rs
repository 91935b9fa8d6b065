// 💳 Account Dimension
// Keyed by name. Rows are created lazily on first sight and never updated.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    /// Surrogate key assigned by the store
    pub id: i64,

    /// Natural key, unique, compared exactly
    pub name: String,
}

impl Account {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Account {
            id,
            name: name.into(),
        }
    }
}
