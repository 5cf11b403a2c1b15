use crate::SnapshotAdapterError;

/// Failures surfaced by the reconciliation engine and aggregator.
///
/// None of these are retried. A run that sees one is halted; recovery is a
/// full replay from an empty ledger.
#[derive(Debug)]
pub enum ReconcileError {
    /// The snapshot failed validation. Nothing was written.
    MalformedSnapshot(SnapshotAdapterError),
    /// A store read or write failed mid-snapshot.
    Store {
        op: &'static str,
        txid: Option<String>,
        source: anyhow::Error,
    },
    /// Min/max requested over zero deposits.
    EmptyAggregationSet,
    /// A satoshi sum no longer fits in `i64`.
    SumOverflow { txid: String },
    /// The run already failed on an earlier snapshot and refuses further input.
    RunHalted { failed_snapshot: usize },
}

impl ReconcileError {
    pub(crate) fn store(op: &'static str, txid: Option<&str>, source: anyhow::Error) -> Self {
        ReconcileError::Store {
            op,
            txid: txid.map(str::to_string),
            source,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, ReconcileError::MalformedSnapshot(_))
    }

    pub fn is_store_failure(&self) -> bool {
        matches!(self, ReconcileError::Store { .. })
    }
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::MalformedSnapshot(e) => write!(f, "malformed snapshot: {e}"),
            ReconcileError::Store {
                op,
                txid: Some(txid),
                source,
            } => write!(f, "store operation {op} failed for txid '{txid}': {source:#}"),
            ReconcileError::Store {
                op,
                txid: None,
                source,
            } => write!(f, "store operation {op} failed: {source:#}"),
            ReconcileError::EmptyAggregationSet => {
                write!(f, "no data: min/max requested over an empty deposit set")
            }
            ReconcileError::SumOverflow { txid } => {
                write!(f, "deposit sum overflowed while adding txid '{txid}'")
            }
            ReconcileError::RunHalted { failed_snapshot } => write!(
                f,
                "run halted after snapshot #{failed_snapshot} failed; replay from an empty ledger"
            ),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::MalformedSnapshot(e) => Some(e),
            ReconcileError::Store { source, .. } => Some(&**source),
            _ => None,
        }
    }
}

impl From<SnapshotAdapterError> for ReconcileError {
    fn from(e: SnapshotAdapterError) -> Self {
        ReconcileError::MalformedSnapshot(e)
    }
}
