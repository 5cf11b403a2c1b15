//! Snapshot adapter: decode the wallet wire format into a typed [`Snapshot`].
//!
//! # Purpose
//! The snapshot source hands us loosely-typed JSON (`{"transactions": [...],
//! "lastblock": ...}`). This module mirrors that document in `Raw*` structs
//! and converts it into the typed [`Snapshot`] consumed by the engine.
//!
//! # Design constraints
//! - Pure, deterministic conversion. No IO, no async.
//! - All-or-nothing: one bad observation rejects the whole snapshot.
//! - Unknown fields are kept (`extra`) and written back verbatim on insert.
//! - Negative confirmations are NOT a format error. They are a valid report of
//!   a conflicted transaction and are handled by the engine.

use serde::Deserialize;
use serde_json::{Map, Value};

use wdl_schemas::{DepositRecord, Snapshot, MAX_AMOUNT_BTC};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// All errors that can occur during snapshot normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotAdapterError {
    /// The document is not a JSON object.
    NotAnObject,
    /// No `transactions` array at the top level.
    MissingTransactions,
    /// An observation (or the document) could not be decoded.
    Decode { index: Option<usize>, message: String },
    /// A required field was absent or null.
    MissingField { index: usize, field: &'static str },
    /// `txid` was present but empty.
    EmptyTxid { index: usize },
    /// `amount` was NaN, infinite, negative or above the total BTC supply.
    InvalidAmount {
        index: usize,
        txid: String,
        amount: f64,
    },
}

impl std::fmt::Display for SnapshotAdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "snapshot document is not a JSON object"),
            Self::MissingTransactions => {
                write!(f, "snapshot document has no 'transactions' array")
            }
            Self::Decode {
                index: Some(i),
                message,
            } => write!(f, "observation #{i} could not be decoded: {message}"),
            Self::Decode {
                index: None,
                message,
            } => write!(f, "snapshot document could not be decoded: {message}"),
            Self::MissingField { index, field } => {
                write!(f, "observation #{index} is missing required field '{field}'")
            }
            Self::EmptyTxid { index } => write!(f, "observation #{index} has empty txid"),
            Self::InvalidAmount {
                index,
                txid,
                amount,
            } => write!(
                f,
                "observation #{index} (txid '{txid}') has invalid amount {amount}"
            ),
        }
    }
}

impl std::error::Error for SnapshotAdapterError {}

// ---------------------------------------------------------------------------
// Raw wire-level structs  (wallet JSON → these → internal types)
// ---------------------------------------------------------------------------

/// Wire-level snapshot document.
///
/// `transactions` stays as raw values so each observation can be decoded on
/// its own and reported with its index.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSnapshot {
    pub transactions: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Wire-level transaction observation.
///
/// Every interpreted field is optional here so absence can be reported as
/// [`SnapshotAdapterError::MissingField`] instead of a generic decode error.
#[derive(Debug, Clone, Deserialize)]
pub struct RawObservation {
    pub txid: Option<String>,
    pub address: Option<String>,
    pub amount: Option<f64>,
    /// Absent while unconfirmed.
    pub blockhash: Option<String>,
    pub confirmations: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Parse and validate a raw snapshot document.
pub fn normalize_snapshot(doc: &Value) -> Result<Snapshot, SnapshotAdapterError> {
    if !doc.is_object() {
        return Err(SnapshotAdapterError::NotAnObject);
    }

    let raw: RawSnapshot =
        serde_json::from_value(doc.clone()).map_err(|e| SnapshotAdapterError::Decode {
            index: None,
            message: e.to_string(),
        })?;

    let items = raw
        .transactions
        .ok_or(SnapshotAdapterError::MissingTransactions)?;

    let mut transactions = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        transactions.push(normalize_observation(index, item)?);
    }

    Ok(Snapshot {
        transactions,
        extra: raw.extra,
    })
}

/// Convert one raw observation into a [`DepositRecord`].
pub fn normalize_observation(
    index: usize,
    item: Value,
) -> Result<DepositRecord, SnapshotAdapterError> {
    let raw: RawObservation =
        serde_json::from_value(item).map_err(|e| SnapshotAdapterError::Decode {
            index: Some(index),
            message: e.to_string(),
        })?;

    let txid = raw
        .txid
        .ok_or(SnapshotAdapterError::MissingField {
            index,
            field: "txid",
        })?;
    let confirmations = raw.confirmations.ok_or(SnapshotAdapterError::MissingField {
        index,
        field: "confirmations",
    })?;
    let address = raw.address.ok_or(SnapshotAdapterError::MissingField {
        index,
        field: "address",
    })?;
    let amount = raw.amount.ok_or(SnapshotAdapterError::MissingField {
        index,
        field: "amount",
    })?;

    let rec = DepositRecord {
        txid,
        address,
        amount,
        blockhash: raw.blockhash.unwrap_or_default(),
        confirmations,
        extra: raw.extra,
    };
    check_observation(index, &rec)?;
    Ok(rec)
}

/// Value checks shared by the JSON path and typed snapshots.
pub(crate) fn check_observation(
    index: usize,
    rec: &DepositRecord,
) -> Result<(), SnapshotAdapterError> {
    if rec.txid.trim().is_empty() {
        return Err(SnapshotAdapterError::EmptyTxid { index });
    }
    if !rec.amount.is_finite() || rec.amount < 0.0 || rec.amount > MAX_AMOUNT_BTC {
        return Err(SnapshotAdapterError::InvalidAmount {
            index,
            txid: rec.txid.clone(),
            amount: rec.amount,
        });
    }
    Ok(())
}
