//! Reconciliation run context.
//!
//! A [`LedgerRun`] owns the store for the duration of one sequential replay.
//! Snapshots are numbered from 1 in the order they are applied. The first
//! failure halts the run (sticky): later snapshots are refused with
//! [`ReconcileError::RunHalted`], because correctness depends on every prior
//! snapshot having been applied.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use wdl_schemas::{DirectoryEntry, Snapshot};

use crate::{
    aggregate_store, apply_snapshot, normalize_snapshot, AggregateResult, DepositStore,
    ReconcileError, ReconcilePolicy, SnapshotReport,
};

/// Counters summed over every snapshot applied so far.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub snapshots: usize,
    pub observed: usize,
    pub advanced: usize,
    pub aged_out: usize,
    pub inserted: usize,
    pub updated: usize,
    pub duplicate: usize,
    pub rejected: usize,
}

impl RunTotals {
    fn absorb(&mut self, r: &SnapshotReport) {
        self.snapshots += 1;
        self.observed += r.observed;
        self.advanced += r.advanced;
        self.aged_out += r.aged_out;
        self.inserted += r.inserted;
        self.updated += r.updated;
        self.duplicate += r.duplicate;
        self.rejected += r.rejected.len();
    }
}

pub struct LedgerRun<S: DepositStore> {
    store: S,
    policy: ReconcilePolicy,
    totals: RunTotals,
    halted_at: Option<usize>,
}

impl<S: DepositStore> LedgerRun<S> {
    pub fn new(store: S, policy: ReconcilePolicy) -> Self {
        Self {
            store,
            policy,
            totals: RunTotals::default(),
            halted_at: None,
        }
    }

    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    pub fn totals(&self) -> &RunTotals {
        &self.totals
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_halted(&self) -> bool {
        self.halted_at.is_some()
    }

    /// 1-based index the next snapshot will get.
    pub fn next_index(&self) -> usize {
        self.totals.snapshots + 1
    }

    /// Apply the next snapshot in sequence.
    pub async fn apply(&mut self, snapshot: &Snapshot) -> Result<SnapshotReport, ReconcileError> {
        if let Some(failed_snapshot) = self.halted_at {
            return Err(ReconcileError::RunHalted { failed_snapshot });
        }

        let index = self.next_index();
        match apply_snapshot(&mut self.store, snapshot, &self.policy).await {
            Ok(report) => {
                self.totals.absorb(&report);
                Ok(report)
            }
            Err(e) => {
                error!(snapshot = index, error = %e, "snapshot failed; halting run");
                self.halted_at = Some(index);
                Err(e)
            }
        }
    }

    /// Normalize a raw wallet document, then apply it.
    pub async fn apply_raw(&mut self, doc: &Value) -> Result<SnapshotReport, ReconcileError> {
        if let Some(failed_snapshot) = self.halted_at {
            return Err(ReconcileError::RunHalted { failed_snapshot });
        }
        match normalize_snapshot(doc) {
            Ok(snapshot) => self.apply(&snapshot).await,
            Err(e) => {
                let index = self.next_index();
                error!(snapshot = index, error = %e, "snapshot rejected; halting run");
                self.halted_at = Some(index);
                Err(ReconcileError::MalformedSnapshot(e))
            }
        }
    }

    /// Balance aggregation over the current ledger.
    pub async fn aggregate(
        &self,
        directory: &[DirectoryEntry],
    ) -> Result<AggregateResult, ReconcileError> {
        aggregate_store(&self.store, directory).await
    }

    /// End the run and hand the store back for teardown or inspection.
    pub fn finish(self) -> S {
        info!(
            store = self.store.store_name(),
            snapshots = self.totals.snapshots,
            inserted = self.totals.inserted,
            updated = self.totals.updated,
            halted = self.halted_at.is_some(),
            "run finished"
        );
        self.store
    }
}
