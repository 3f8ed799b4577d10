//! In-process table engine with serializable optimistic transactions.
//!
//! Holds the `Users` table as text columns (`id`, `name`, `money`), the same
//! shape a relational backend would store. Every row carries the version of
//! the commit that last touched it; deleted rows keep a tombstone so a
//! delete-then-recreate is still seen as a change.
//!
//! ## Commit protocol
//!
//! ```text
//! 1. begin()        - capture start version and deadline
//! 2. read_row/scan  - record observed versions in the read set
//! 3. insert/update/delete - buffer writes, report affected rows
//! 4. commit()       - under the table write lock:
//!                     validate read set (first-committer-wins),
//!                     allocate one commit version, apply all writes
//! ```
//!
//! A transaction that is dropped without `commit()` leaves no trace.

use log::debug;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// One row of the `Users` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: i64,
    pub name: String,
    pub money: String,
}

/// Column assignments for an `UPDATE ... SET` on a single row.
#[derive(Debug, Clone, Default)]
pub struct RowUpdate {
    pub name: Option<String>,
    pub money: Option<String>,
}

impl RowUpdate {
    fn apply(self, row: &mut Row) {
        if let Some(name) = self.name {
            row.name = name;
        }
        if let Some(money) = self.money {
            row.money = money;
        }
    }
}

/// Errors raised by the table engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// A row this transaction read was changed by a transaction that committed first.
    #[error("write-write conflict on {}", describe_conflict(.id))]
    Conflict { id: Option<i64> },

    /// Primary key already present.
    #[error("row {id} already exists")]
    AlreadyExists { id: i64 },

    /// The transaction outlived its deadline.
    #[error("deadline exceeded after {elapsed_ms} ms")]
    DeadlineExceeded { elapsed_ms: u128 },
}

fn describe_conflict(id: &Option<i64>) -> String {
    match id {
        Some(id) => format!("row {}", id),
        None => "table scan".to_string(),
    }
}

#[derive(Debug, Clone)]
struct Versioned {
    row: Option<Row>,
    version: u64,
}

/// The backing table. Safe to share between threads.
#[derive(Debug, Default)]
pub struct Database {
    table: RwLock<BTreeMap<i64, Versioned>>,

    /// Version of the most recent commit. Bumped once per committed transaction.
    version: AtomicU64,

    next_txn_id: AtomicU64,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version of the most recent commit.
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Opens a read-write transaction that must commit within `timeout`.
    pub fn begin(&self, timeout: Duration) -> Transaction<'_> {
        let started = Instant::now();
        Transaction {
            db: self,
            txn_id: self.next_txn_id.fetch_add(1, Ordering::SeqCst) + 1,
            start_version: self.current_version(),
            started,
            deadline: started + timeout,
            read_set: HashMap::new(),
            scanned: false,
            writes: BTreeMap::new(),
        }
    }

    /// Single-use strong read of one row.
    pub fn read_row(&self, id: i64) -> Option<Row> {
        self.table.read().get(&id).and_then(|v| v.row.clone())
    }

    /// Single-use strong read of every live row, ordered by id.
    ///
    /// The whole scan happens under one read lock, so no commit interleaves.
    pub fn scan(&self) -> Vec<Row> {
        self.table
            .read()
            .values()
            .filter_map(|v| v.row.clone())
            .collect()
    }
}

/// A serializable read-write transaction.
pub struct Transaction<'db> {
    db: &'db Database,
    txn_id: u64,
    start_version: u64,
    started: Instant,
    deadline: Instant,

    /// Version of each row as first observed (0 = absent).
    read_set: HashMap<i64, u64>,

    /// Set once a full-table scan has been performed.
    scanned: bool,

    /// Buffered writes; `None` deletes the row.
    writes: BTreeMap<i64, Option<Row>>,
}

impl<'db> Transaction<'db> {
    /// Internal identifier, for logs only.
    pub fn txn_id(&self) -> u64 {
        self.txn_id
    }

    fn check_deadline(&self) -> Result<(), DbError> {
        if Instant::now() >= self.deadline {
            return Err(DbError::DeadlineExceeded {
                elapsed_ms: self.started.elapsed().as_millis(),
            });
        }
        Ok(())
    }

    /// Reads a row, seeing this transaction's own buffered writes.
    pub fn read_row(&mut self, id: i64) -> Result<Option<Row>, DbError> {
        self.check_deadline()?;

        if let Some(pending) = self.writes.get(&id) {
            return Ok(pending.clone());
        }

        let table = self.db.table.read();
        let entry = table.get(&id);
        let version = entry.map_or(0, |v| v.version);
        self.read_set.entry(id).or_insert(version);
        Ok(entry.and_then(|v| v.row.clone()))
    }

    /// Reads every live row, ordered by id, merged with buffered writes.
    pub fn scan(&mut self) -> Result<Vec<Row>, DbError> {
        self.check_deadline()?;
        self.scanned = true;

        let table = self.db.table.read();
        let mut rows: BTreeMap<i64, Row> = table
            .iter()
            .filter_map(|(id, v)| v.row.clone().map(|row| (*id, row)))
            .collect();
        drop(table);

        for (id, pending) in &self.writes {
            match pending {
                Some(row) => {
                    rows.insert(*id, row.clone());
                }
                None => {
                    rows.remove(id);
                }
            }
        }

        Ok(rows.into_values().collect())
    }

    /// `INSERT`: fails if the primary key is taken.
    pub fn insert(&mut self, row: Row) -> Result<(), DbError> {
        if self.read_row(row.id)?.is_some() {
            return Err(DbError::AlreadyExists { id: row.id });
        }
        self.writes.insert(row.id, Some(row));
        Ok(())
    }

    /// `UPDATE ... WHERE id = ?`. Returns the number of rows affected.
    pub fn update(&mut self, id: i64, changes: RowUpdate) -> Result<usize, DbError> {
        match self.read_row(id)? {
            Some(mut row) => {
                changes.apply(&mut row);
                self.writes.insert(id, Some(row));
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// `DELETE ... WHERE id = ?`. Returns the number of rows affected.
    pub fn delete(&mut self, id: i64) -> Result<usize, DbError> {
        match self.read_row(id)? {
            Some(_) => {
                self.writes.insert(id, None);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// Validates and applies all buffered writes atomically.
    ///
    /// Returns the commit version. On conflict or deadline nothing is applied.
    pub fn commit(self) -> Result<u64, DbError> {
        self.check_deadline()?;

        let mut table = self.db.table.write();

        for (id, read_version) in &self.read_set {
            let current = table.get(id).map_or(0, |v| v.version);
            if current != *read_version {
                debug!(
                    "txn {}: row {} read at v{} but now v{}",
                    self.txn_id, id, read_version, current
                );
                return Err(DbError::Conflict { id: Some(*id) });
            }
        }

        if self.scanned && table.values().any(|v| v.version > self.start_version) {
            debug!(
                "txn {}: table changed since scan at v{}",
                self.txn_id, self.start_version
            );
            return Err(DbError::Conflict { id: None });
        }

        if self.writes.is_empty() {
            return Ok(self.db.current_version());
        }

        let commit_version = self.db.version.fetch_add(1, Ordering::SeqCst) + 1;
        for (id, row) in self.writes {
            table.insert(
                id,
                Versioned {
                    row,
                    version: commit_version,
                },
            );
        }

        Ok(commit_version)
    }
}
