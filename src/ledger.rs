//! Batch front end over the record store.
//!
//! Streams commands from CSV, dispatches each to the record store or the
//! balance mutator, and writes the resulting record set back out as CSV.

use crate::command::{Command, CommandRecord};
use crate::error::{LedgerError, Result};
use crate::mutator::BalanceMutator;
use crate::record::Record;
use crate::store::RecordStore;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::{debug, info, warn};
use std::io::{Read, Write};

/// Counts of processed command rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub applied: usize,
    pub rejected: usize,
}

/// Dispatches commands to the store and the balance mutator.
///
/// Holds no state of its own: the database behind the store is the only
/// source of truth, so several `Ledger`s over clones of one store may run
/// side by side.
#[derive(Debug, Clone)]
pub struct Ledger {
    store: RecordStore,
    mutator: BalanceMutator,
}

impl Ledger {
    pub fn new(store: RecordStore) -> Self {
        let mutator = BalanceMutator::new(store.clone());
        Ledger { store, mutator }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Applies one validated command, returning the affected record.
    pub fn apply(&self, command: &Command) -> Result<Record> {
        match command {
            Command::Create(record) => self.store.create(record),
            Command::Get { id } => self.store.read_by_id(*id),
            Command::Update { id, name, balance } => {
                self.store.update_fields(*id, name, *balance)
            }
            Command::AddMoney { id, delta } => self.mutator.add_balance(*id, delta),
            Command::Delete { id } => self.store.delete(*id),
        }
    }

    /// Processes commands from a CSV reader in streaming fashion.
    ///
    /// Rows that fail to parse, fail validation or fail in the store are
    /// logged at warn level and skipped.
    pub fn process_csv<R: Read>(&self, reader: R) -> Result<BatchSummary> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut summary = BatchSummary::default();

        for (row_idx, result) in csv_reader.deserialize::<CommandRecord>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            let outcome = result
                .map_err(LedgerError::from)
                .and_then(|raw| raw.parse())
                .and_then(|command| self.apply(&command).map(|record| (command, record)));

            match outcome {
                Ok((Command::Get { .. }, record)) => {
                    summary.applied += 1;
                    info!(
                        "Row {}: record {} is {} / {}",
                        row_num, record.id, record.name, record.balance
                    );
                }
                Ok((_, record)) => {
                    summary.applied += 1;
                    debug!(
                        "Row {}: record {} now {} / {}",
                        row_num, record.id, record.name, record.balance
                    );
                }
                Err(e) => {
                    summary.rejected += 1;
                    warn!("Row {}: {}", row_num, e);
                }
            }
        }

        Ok(summary)
    }

    /// Writes every record as CSV (`id,name,money`), ordered by id.
    pub fn write_output<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);

        csv_writer.write_record(["id", "name", "money"])?;
        for record in self.store.read_all()? {
            csv_writer.serialize(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}
