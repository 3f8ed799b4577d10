//! Error types for the record store.

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Closed set of failure kinds callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    DuplicateKey,
    InvalidAmount,
    TransactionConflict,
    NoRowsAffected,
    DeadlineExceeded,
    Internal,
}

/// Errors that can occur during store operation.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed or missing request fields, rejected before any transaction opens
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Referenced record does not exist
    #[error("Record {id} not found")]
    NotFound { id: i64 },

    /// Create collided with an existing id
    #[error("Record {id} already exists")]
    DuplicateKey { id: i64 },

    /// Text is not a valid decimal, or the sum does not fit
    #[error("Invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: String },

    /// Another transaction committed a conflicting write first
    #[error("Transaction conflict after {attempts} attempt(s)")]
    TransactionConflict { attempts: usize },

    /// A write that passed its existence check touched zero rows
    #[error("Write to record {id} affected no rows")]
    NoRowsAffected { id: i64 },

    /// The transaction ran past its deadline and was aborted
    #[error("Transaction deadline exceeded after {elapsed_ms} ms")]
    DeadlineExceeded { elapsed_ms: u128 },

    /// Unexpected store failure
    #[error("Internal store error: {0}")]
    Internal(String),

    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Missing input file argument
    #[error("Missing input file argument. Usage: ledger-store <commands.csv>")]
    MissingArgument,
}

impl LedgerError {
    pub(crate) fn invalid_amount(input: &str, reason: impl ToString) -> Self {
        LedgerError::InvalidAmount {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns the tagged kind of this error.
    ///
    /// I/O and CSV failures of the batch driver are reported as `Internal`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) | LedgerError::MissingArgument => ErrorKind::Validation,
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            LedgerError::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            LedgerError::TransactionConflict { .. } => ErrorKind::TransactionConflict,
            LedgerError::NoRowsAffected { .. } => ErrorKind::NoRowsAffected,
            LedgerError::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            LedgerError::Internal(_) | LedgerError::Io(_) | LedgerError::Csv(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns `true` if retrying the whole transaction may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::TransactionConflict { .. })
    }
}
