use serde::{Deserialize, Serialize};
use wdl_schemas::{format_sats, DepositRecord, DEFAULT_FINALITY_THRESHOLD};

use crate::ReconcileError;

/// Reconciliation policy knobs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilePolicy {
    /// Depth at which a deposit is final. Also the depth a pending record is
    /// forced to when it drops out of the source's reporting window.
    pub finality_threshold: i64,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            finality_threshold: DEFAULT_FINALITY_THRESHOLD,
        }
    }
}

impl ReconcilePolicy {
    pub fn with_threshold(finality_threshold: i64) -> Self {
        Self { finality_threshold }
    }
}

/// Why an observation was not applied to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RejectReason {
    /// Negative depth. Nothing is created or replaced.
    NegativeConfirmations,
    /// Negative depth for a pending record, which Step A held unchanged.
    ConflictedPending,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NegativeConfirmations => "NEGATIVE_CONFIRMATIONS",
            RejectReason::ConflictedPending => "CONFLICTED_PENDING",
        }
    }
}

/// Evidence for one rejected observation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedObservation {
    /// Position of the observation inside its snapshot.
    pub position: usize,
    pub txid: String,
    pub address: String,
    pub confirmations: i64,
    pub reason: RejectReason,
}

impl RejectedObservation {
    pub(crate) fn new(position: usize, obs: &DepositRecord, reason: RejectReason) -> Self {
        Self {
            position,
            txid: obs.txid.clone(),
            address: obs.address.clone(),
            confirmations: obs.confirmations,
            reason,
        }
    }
}

/// Outcome of applying one snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReport {
    /// Observations carried by the snapshot.
    pub observed: usize,
    /// Pending records found before Step A.
    pub pending_before: usize,

    // Step A
    /// Pending records replaced by a fresh observation.
    pub advanced: usize,
    /// Pending records absent from the snapshot, forced to the threshold.
    pub aged_out: usize,
    /// Pending records whose observation turned negative; left untouched.
    pub conflicted_held: usize,

    // Step B
    pub inserted: usize,
    /// Delete-then-reinsert after a blockhash change.
    pub updated: usize,
    pub duplicate: usize,
    /// Observations skipped because a later one in the same snapshot carries
    /// the same txid.
    pub superseded: usize,
    pub rejected: Vec<RejectedObservation>,
}

impl SnapshotReport {
    /// Records touched by Step A.
    pub fn pending_updated(&self) -> usize {
        self.advanced + self.aged_out
    }

    /// True when the snapshot changed nothing in the ledger.
    pub fn is_noop(&self) -> bool {
        self.pending_updated() == 0 && self.inserted == 0 && self.updated == 0
    }
}

/// Count and exact satoshi sum of a set of deposits.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTotals {
    pub count: usize,
    pub sum_sats: i64,
}

impl BucketTotals {
    /// Add one deposit. Fails instead of wrapping when the sum leaves `i64`.
    pub fn add(&mut self, rec: &DepositRecord) -> Result<(), ReconcileError> {
        self.sum_sats = self
            .sum_sats
            .checked_add(rec.amount_sats())
            .ok_or_else(|| ReconcileError::SumOverflow {
                txid: rec.txid.clone(),
            })?;
        self.count += 1;
        Ok(())
    }

    pub fn sum_display(&self) -> String {
        format_sats(self.sum_sats)
    }
}

/// Totals for one address directory entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressTotals {
    pub name: String,
    pub address: String,
    pub count: usize,
    pub sum_sats: i64,
}

impl AddressTotals {
    pub fn sum_display(&self) -> String {
        format_sats(self.sum_sats)
    }
}

/// Smallest and largest deposit amount over a non-empty record set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: f64,
    pub max: f64,
}

/// Balance aggregation over the ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// One entry per directory entry, in directory order.
    pub per_address: Vec<AddressTotals>,
    /// Deposits to addresses absent from the directory.
    pub unreferenced: BucketTotals,
    /// Every deposit in the ledger.
    pub total: BucketTotals,
    /// `None` when the ledger is empty.
    pub range: Option<AmountRange>,
}

impl AggregateResult {
    /// Min/max, or `EmptyAggregationSet` when there is nothing to measure.
    pub fn amount_range(&self) -> Result<&AmountRange, ReconcileError> {
        self.range.as_ref().ok_or(ReconcileError::EmptyAggregationSet)
    }
}
