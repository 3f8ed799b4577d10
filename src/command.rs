//! Batch command models for CSV parsing and dispatch.

use crate::decimal::{self, Amount};
use crate::error::{LedgerError, Result};
use crate::record::Record;
use serde::Deserialize;

/// Raw command row as read from CSV.
///
/// Every field but `op` is optional at this stage; which ones are required
/// depends on the operation and is checked by [`CommandRecord::parse`].
#[derive(Debug, Deserialize)]
pub struct CommandRecord {
    /// Operation: create, get, update, addmoney, delete
    pub op: String,

    pub id: Option<i64>,

    pub name: Option<String>,

    /// Balance for create/update, signed delta for addmoney
    pub money: Option<String>,
}

impl CommandRecord {
    /// Validates the raw row into a typed command.
    ///
    /// Fails with `Validation` for unknown operations and missing or malformed
    /// fields. The addmoney delta is kept as text: it is parsed by the
    /// balance mutator, which reports a bad delta as `InvalidAmount`.
    pub fn parse(&self) -> Result<Command> {
        let op = self.op.trim().to_lowercase();

        match op.as_str() {
            "create" => Ok(Command::Create(Record::new(
                self.require_id()?,
                self.require_name()?,
                self.require_balance()?,
            ))),
            "get" => Ok(Command::Get {
                id: self.require_id()?,
            }),
            "update" => Ok(Command::Update {
                id: self.require_id()?,
                name: self.require_name()?,
                balance: self.require_balance()?,
            }),
            "addmoney" => Ok(Command::AddMoney {
                id: self.require_id()?,
                delta: self.require_money()?.to_string(),
            }),
            "delete" => Ok(Command::Delete {
                id: self.require_id()?,
            }),
            other => Err(LedgerError::Validation(format!(
                "unknown operation {:?}",
                other
            ))),
        }
    }

    fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| LedgerError::Validation("missing id".to_string()))
    }

    fn require_name(&self) -> Result<String> {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(LedgerError::Validation("missing name".to_string())),
        }
    }

    fn require_money(&self) -> Result<&str> {
        match self.money.as_deref().map(str::trim) {
            Some(money) if !money.is_empty() => Ok(money),
            _ => Err(LedgerError::Validation("missing money".to_string())),
        }
    }

    fn require_balance(&self) -> Result<Amount> {
        let money = self.require_money()?;
        decimal::parse(money)
            .map_err(|e| LedgerError::Validation(format!("bad money field: {}", e)))
    }
}

/// A validated command ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Insert a new record.
    Create(Record),

    /// Look up a record without changing it.
    Get { id: i64 },

    /// Replace name and balance of an existing record.
    Update {
        id: i64,
        name: String,
        balance: Amount,
    },

    /// Add a signed delta to a record's balance.
    AddMoney { id: i64, delta: String },

    /// Remove a record.
    Delete { id: i64 },
}

impl Command {
    /// Record the command targets.
    pub fn id(&self) -> i64 {
        match self {
            Command::Create(record) => record.id,
            Command::Get { id }
            | Command::Update { id, .. }
            | Command::AddMoney { id, .. }
            | Command::Delete { id } => *id,
        }
    }
}
