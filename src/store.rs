//! Record store over the backing table.
//!
//! Every mutating operation runs inside [`RecordStore::run_transaction`], the
//! retry loop that owns conflict detection and backoff. Callers that need
//! several operations to share one transaction (the balance mutator, for
//! one) pass a closure that receives a transaction-scoped [`TxnStore`].

use crate::config::StoreConfig;
use crate::database::{Database, DbError, Row, RowUpdate, Transaction};
use crate::decimal::{self, Amount};
use crate::error::{LedgerError, Result};
use crate::record::Record;
use log::{debug, warn};
use std::sync::Arc;
use std::thread;

/// Handle to the record table.
///
/// Cheap to clone; all clones share the same database.
#[derive(Debug, Clone)]
pub struct RecordStore {
    db: Arc<Database>,
    config: StoreConfig,
}

impl RecordStore {
    pub fn new(db: Arc<Database>, config: StoreConfig) -> Self {
        RecordStore { db, config }
    }

    /// A store over a fresh, empty database with default settings.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(Database::new()), StoreConfig::default())
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Runs `body` in a serializable transaction, retrying on conflict.
    ///
    /// `body` may run more than once, so it must not have side effects
    /// outside the transaction. An error from `body` aborts the attempt and is
    /// returned as-is. A commit that loses a write-write conflict is retried
    /// from scratch with exponential backoff until the retry budget runs out,
    /// at which point `TransactionConflict` is returned.
    pub fn run_transaction<T, F>(&self, mut body: F) -> Result<T>
    where
        F: FnMut(&mut TxnStore<'_, '_>) -> Result<T>,
    {
        let retry = &self.config.retry;

        for attempt in 0..=retry.max_retries {
            let mut txn = self.db.begin(self.config.timeout);
            let txn_id = txn.txn_id();

            let result = body(&mut TxnStore { txn: &mut txn });
            let outcome = result.and_then(|value| {
                txn.commit()
                    .map(|version| {
                        debug!("txn {} committed at v{}", txn_id, version);
                        value
                    })
                    .map_err(|e| commit_error(e, attempt + 1))
            });

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_conflict() && attempt < retry.max_retries => {
                    let delay = retry.delay_for(attempt);
                    debug!(
                        "txn {} conflicted on attempt {}, retrying in {:?}",
                        txn_id,
                        attempt + 1,
                        delay
                    );
                    thread::sleep(delay);
                }
                Err(e) => {
                    if e.is_conflict() {
                        warn!("txn {} gave up: {}", txn_id, e);
                    }
                    return Err(e);
                }
            }
        }

        Err(LedgerError::Internal(
            "retry loop exited without a result".to_string(),
        ))
    }

    /// Inserts a new record. Fails `DuplicateKey` if the id is taken.
    pub fn create(&self, record: &Record) -> Result<Record> {
        let created = self.run_transaction(|store| store.create(record))?;
        debug!("Created record {}", created.id);
        Ok(created)
    }

    /// Returns the current snapshot of a record.
    pub fn read_by_id(&self, id: i64) -> Result<Record> {
        match self.db.read_row(id) {
            Some(row) => record_from_row(row),
            None => Err(LedgerError::NotFound { id }),
        }
    }

    /// Returns every record, ordered by id, as of one consistent read.
    pub fn read_all(&self) -> Result<Vec<Record>> {
        self.db.scan().into_iter().map(record_from_row).collect()
    }

    /// Replaces `name` and `balance` of an existing record.
    pub fn update_fields(&self, id: i64, name: &str, balance: Amount) -> Result<Record> {
        let updated = self.run_transaction(|store| store.update_fields(id, name, balance))?;
        debug!("Updated record {} to balance {}", id, updated.balance);
        Ok(updated)
    }

    /// Removes a record, returning its last snapshot.
    pub fn delete(&self, id: i64) -> Result<Record> {
        let deleted = self.run_transaction(|store| store.delete(id))?;
        debug!("Deleted record {}", id);
        Ok(deleted)
    }
}

/// Record operations bound to one open transaction.
pub struct TxnStore<'t, 'db> {
    txn: &'t mut Transaction<'db>,
}

impl TxnStore<'_, '_> {
    pub fn create(&mut self, record: &Record) -> Result<Record> {
        self.txn.insert(row_from_record(record))?;
        Ok(record.clone())
    }

    pub fn read_by_id(&mut self, id: i64) -> Result<Record> {
        match self.txn.read_row(id)? {
            Some(row) => record_from_row(row),
            None => Err(LedgerError::NotFound { id }),
        }
    }

    pub fn read_all(&mut self) -> Result<Vec<Record>> {
        self.txn
            .scan()?
            .into_iter()
            .map(record_from_row)
            .collect()
    }

    pub fn update_fields(&mut self, id: i64, name: &str, balance: Amount) -> Result<Record> {
        self.read_by_id(id)?;

        let changes = RowUpdate {
            name: Some(name.to_string()),
            money: Some(decimal::format(balance)),
        };
        if self.txn.update(id, changes)? == 0 {
            return Err(LedgerError::NoRowsAffected { id });
        }

        Ok(Record::new(id, name, balance))
    }

    /// Overwrites only the balance column.
    pub fn write_balance(&mut self, id: i64, balance: Amount) -> Result<()> {
        let changes = RowUpdate {
            money: Some(decimal::format(balance)),
            ..Default::default()
        };
        if self.txn.update(id, changes)? == 0 {
            return Err(LedgerError::NoRowsAffected { id });
        }
        Ok(())
    }

    pub fn delete(&mut self, id: i64) -> Result<Record> {
        let snapshot = self.read_by_id(id)?;
        if self.txn.delete(id)? == 0 {
            return Err(LedgerError::NotFound { id });
        }
        Ok(snapshot)
    }
}

fn row_from_record(record: &Record) -> Row {
    Row {
        id: record.id,
        name: record.name.clone(),
        money: decimal::format(record.balance),
    }
}

fn record_from_row(row: Row) -> Result<Record> {
    let balance = decimal::parse(&row.money)?;
    Ok(Record {
        id: row.id,
        name: row.name,
        balance,
    })
}

fn commit_error(err: DbError, attempts: usize) -> LedgerError {
    match err {
        DbError::Conflict { .. } => LedgerError::TransactionConflict { attempts },
        other => other.into(),
    }
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict { .. } => LedgerError::TransactionConflict { attempts: 1 },
            DbError::AlreadyExists { id } => LedgerError::DuplicateKey { id },
            DbError::DeadlineExceeded { elapsed_ms } => {
                LedgerError::DeadlineExceeded { elapsed_ms }
            }
        }
    }
}
