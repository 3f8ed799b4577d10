//! Atomic read-modify-write of a record's balance.
//!
//! The read of the current balance and the write of the new one happen in
//! the same serializable transaction, so two concurrent adjustments of one
//! record can never both start from the same stale balance. If another
//! writer commits first, the whole read-add-write sequence is re-run by the
//! store's retry loop against the fresh balance.

use crate::decimal::{self, Amount};
use crate::error::Result;
use crate::record::Record;
use crate::store::RecordStore;
use log::debug;

/// Applies signed deltas to record balances.
#[derive(Debug, Clone)]
pub struct BalanceMutator {
    store: RecordStore,
}

impl BalanceMutator {
    pub fn new(store: RecordStore) -> Self {
        BalanceMutator { store }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Adds `delta_text` to the balance of record `id`.
    ///
    /// Fails `InvalidAmount` if the delta or the stored balance is not a
    /// valid decimal, `NotFound` if the record does not exist, and
    /// `TransactionConflict` once conflict retries are exhausted. On any
    /// failure the stored balance is untouched.
    pub fn add_balance(&self, id: i64, delta_text: &str) -> Result<Record> {
        let delta = decimal::parse(delta_text)?;
        self.add_amount(id, delta)
    }

    /// Same as [`add_balance`](Self::add_balance) with an already parsed delta.
    pub fn add_amount(&self, id: i64, delta: Amount) -> Result<Record> {
        let updated = self.store.run_transaction(|store| {
            let mut record = store.read_by_id(id)?;
            record.balance = decimal::add(record.balance, delta)?;
            store.write_balance(id, record.balance)?;
            Ok(record)
        })?;

        debug!(
            "Added {} to record {}, balance now {}",
            delta, id, updated.balance
        );
        Ok(updated)
    }
}
