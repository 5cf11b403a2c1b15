//! wdl-reconcile
//!
//! Snapshot reconciliation engine for the deposit ledger.
//!
//! Each snapshot is applied in two ordered steps:
//! - Step A: every pending record (0 <= confirmations < threshold) is either
//!   replaced by its new observation or, when absent, aged to the threshold.
//! - Step B: every observation is ingested in order: inserted when new,
//!   ignored when unchanged, delete-then-reinserted when its blockhash moved.
//!
//! Observations with negative confirmations never create or replace a record.
//! When a txid repeats inside one snapshot, only its last non-negative
//! occurrence is applied.
//!
//! No IO beyond the [`DepositStore`] seam.

mod aggregate;
mod engine;
mod error;
mod memory;
mod run;
pub mod snapshot_adapter;
mod store;
mod types;

pub use aggregate::{aggregate, aggregate_store, amount_range, totals};
pub use engine::{apply_snapshot, validate_snapshot};
pub use error::ReconcileError;
pub use memory::MemoryDepositStore;
pub use run::{LedgerRun, RunTotals};
pub use snapshot_adapter::{normalize_snapshot, SnapshotAdapterError};
pub use store::{DepositFilter, DepositStore, DepositUpdate};
pub use types::*;

pub use wdl_schemas::{DepositRecord, DirectoryEntry, Snapshot};
