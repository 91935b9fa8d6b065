// Entity Models
// Two dimensions keyed by natural name, one append-only fact table.

pub mod account;
pub mod category;
pub mod transaction;

pub use account::Account;
pub use category::Category;
pub use transaction::{NewTransaction, Transaction, TransactionKind};
