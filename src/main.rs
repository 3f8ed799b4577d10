//! `ledger-store` command-line driver.
//!
//! Reads a CSV file of `op,id,name,money` rows (`create`, `get`, `update`,
//! `addmoney`, `delete`), applies them to a fresh in-memory store in order,
//! and prints every record left at the end as `id,name,money`, sorted by id.
//! Rows that fail are logged and skipped; a missing or unreadable file exits
//! with status 1.
//!
//! ```bash
//! RUST_LOG=info ledger-store commands.csv > records.csv
//! ```

use ledger_store::{Ledger, LedgerError, RecordStore, Result};
use log::info;
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(LedgerError::MissingArgument);
    }

    let input_path = &args[1];
    let file = File::open(input_path)?;
    let reader = BufReader::new(file);

    let ledger = Ledger::new(RecordStore::in_memory());
    let summary = ledger.process_csv(reader)?;
    info!(
        "Applied {} command(s), rejected {}",
        summary.applied, summary.rejected
    );

    let stdout = io::stdout();
    let handle = stdout.lock();
    ledger.write_output(handle)?;

    Ok(())
}
