//! # Ledger Store
//!
//! Records of `(id, name, balance)` kept in a transactional table, with an
//! atomic read-modify-write path for adjusting a balance by a signed delta.
//!
//! ## Design Principles
//!
//! - **Exact arithmetic**: balances are `rust_decimal` values, text only at
//!   the storage and wire boundaries
//! - **Serializable transactions**: optimistic, first-committer-wins, with
//!   bounded retry and exponential backoff on conflict
//! - **No lost updates**: concurrent balance adjustments of one record always
//!   sum, whatever the interleaving
//! - **Tagged errors**: every failure carries an [`ErrorKind`]
//!
//! ## Example
//!
//! ```
//! use ledger_store::{BalanceMutator, Record, RecordStore};
//!
//! let store = RecordStore::in_memory();
//! store.create(&Record::new(1, "alice", "100.00".parse().unwrap())).unwrap();
//!
//! let mutator = BalanceMutator::new(store.clone());
//! let record = mutator.add_balance(1, "-30.00").unwrap();
//! assert_eq!(record.balance.to_string(), "70.00");
//! ```

pub mod command;
pub mod config;
pub mod database;
pub mod decimal;
pub mod error;
pub mod ledger;
pub mod mutator;
pub mod record;
pub mod store;

pub use command::{Command, CommandRecord};
pub use config::{RetryConfig, StoreConfig};
pub use database::Database;
pub use decimal::Amount;
pub use error::{ErrorKind, LedgerError, Result};
pub use ledger::{BatchSummary, Ledger};
pub use mutator::BalanceMutator;
pub use record::Record;
pub use store::{RecordStore, TxnStore};
