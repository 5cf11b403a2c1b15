//! Shared deposit-ledger types.
//!
//! Field names mirror the wallet's `listsinceblock`-style reply so that a
//! stored record serializes back to the observation it came from. Any field
//! the ledger does not interpret is carried in `extra` untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Satoshi scale (1e-8). Sums are accumulated in integer satoshis.
pub const SATS_SCALE: i64 = 100_000_000;

/// Largest amount a single observation may carry (total BTC supply).
pub const MAX_AMOUNT_BTC: f64 = 21_000_000.0;

/// Default confirmation depth at which a deposit is treated as final.
pub const DEFAULT_FINALITY_THRESHOLD: i64 = 6;

/// One observed incoming transaction, as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub txid: String,
    pub address: String,
    pub amount: f64,
    /// Empty while the transaction is unconfirmed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub blockhash: String,
    pub confirmations: i64,
    /// Source-specific fields (category, vout, time, ...), preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DepositRecord {
    pub fn new(
        txid: impl Into<String>,
        address: impl Into<String>,
        amount: f64,
        blockhash: impl Into<String>,
        confirmations: i64,
    ) -> Self {
        Self {
            txid: txid.into(),
            address: address.into(),
            amount,
            blockhash: blockhash.into(),
            confirmations,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// `0 <= confirmations < threshold`.
    pub fn is_pending(&self, finality_threshold: i64) -> bool {
        self.confirmations >= 0 && self.confirmations < finality_threshold
    }

    pub fn is_finalized(&self, finality_threshold: i64) -> bool {
        self.confirmations >= finality_threshold
    }

    /// Negative depth marks a conflicted/orphaned observation.
    pub fn is_conflicted(&self) -> bool {
        self.confirmations < 0
    }

    pub fn amount_sats(&self) -> i64 {
        amount_to_sats(self.amount)
    }
}

/// One reconciliation cycle's input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub transactions: Vec<DepositRecord>,
    /// Top-level fields other than `transactions` (e.g. `lastblock`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Snapshot {
    pub fn new(transactions: Vec<DepositRecord>) -> Self {
        Self {
            transactions,
            extra: Map::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Address directory entry, used only to label aggregation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub address: String,
}

impl DirectoryEntry {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Convert a BTC amount to integer satoshis (round half away from zero).
pub fn amount_to_sats(amount: f64) -> i64 {
    (amount * SATS_SCALE as f64).round() as i64
}

/// Render satoshis as a fixed 8-decimal BTC string without going through floats.
pub fn format_sats(sats: i64) -> String {
    let sign = if sats < 0 { "-" } else { "" };
    let abs = sats.unsigned_abs();
    let scale = SATS_SCALE as u64;
    format!("{sign}{}.{:08}", abs / scale, abs % scale)
}
