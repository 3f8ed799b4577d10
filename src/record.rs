//! Record model.

use crate::decimal::Amount;
use serde::{Deserialize, Serialize};

/// A ledger-style record.
///
/// # Invariants
///
/// - `id` never changes once the record is created
/// - `balance` is always an exact decimal; on the wire and in storage it is
///   the text column `money`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Primary key.
    pub id: i64,

    /// Free-form label.
    pub name: String,

    /// Current balance.
    #[serde(rename = "money")]
    pub balance: Amount,
}

impl Record {
    pub fn new(id: i64, name: impl Into<String>, balance: Amount) -> Self {
        Record {
            id,
            name: name.into(),
            balance,
        }
    }
}
