//! Deposit record store boundary.
//!
//! The engine only needs five operations against a keyed store. Concrete
//! stores live elsewhere (`MemoryDepositStore` here, `PgDepositStore` in
//! wdl-db); the engine never sees the storage technology.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use wdl_schemas::DepositRecord;

/// Range/membership predicates a store must be able to evaluate.
///
/// Kept as data (not closures) so SQL stores can translate them to a where
/// clause.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositFilter {
    All,
    /// `min <= confirmations < max_exclusive`
    ConfirmationsInRange { min: i64, max_exclusive: i64 },
    AddressEq(String),
    AddressNotIn(Vec<String>),
}

impl DepositFilter {
    /// Records that are recorded but not yet final.
    pub fn pending(finality_threshold: i64) -> Self {
        DepositFilter::ConfirmationsInRange {
            min: 0,
            max_exclusive: finality_threshold,
        }
    }

    pub fn matches(&self, rec: &DepositRecord) -> bool {
        match self {
            DepositFilter::All => true,
            DepositFilter::ConfirmationsInRange { min, max_exclusive } => {
                rec.confirmations >= *min && rec.confirmations < *max_exclusive
            }
            DepositFilter::AddressEq(addr) => rec.address == *addr,
            DepositFilter::AddressNotIn(addrs) => !addrs.iter().any(|a| *a == rec.address),
        }
    }
}

/// Point update applied to an existing record. The txid never changes.
#[derive(Clone, Debug, PartialEq)]
pub enum DepositUpdate {
    /// Set `confirmations`, leave every other field alone.
    SetConfirmations(i64),
    /// Overwrite every field with a newer observation of the same txid.
    Replace(DepositRecord),
}

impl DepositUpdate {
    /// Apply to an in-memory record. Errors if a replacement carries another txid.
    pub fn apply_to(&self, rec: &mut DepositRecord) -> Result<()> {
        match self {
            DepositUpdate::SetConfirmations(c) => {
                rec.confirmations = *c;
            }
            DepositUpdate::Replace(next) => {
                if next.txid != rec.txid {
                    anyhow::bail!(
                        "replacement txid '{}' does not match record '{}'",
                        next.txid,
                        rec.txid
                    );
                }
                *rec = next.clone();
            }
        }
        Ok(())
    }

    /// Confirmation depth the record will carry after this update.
    pub fn resulting_confirmations(&self) -> i64 {
        match self {
            DepositUpdate::SetConfirmations(c) => *c,
            DepositUpdate::Replace(next) => next.confirmations,
        }
    }
}

/// Keyed deposit store contract.
///
/// Mutations take `&mut self`: a store is owned by exactly one reconciliation
/// run at a time. Results of `find_by_filter` are ordered by txid.
///
/// Implementations must refuse to insert (or update to) a negative
/// confirmation depth, and must refuse a second record for an existing txid.
#[async_trait::async_trait]
pub trait DepositStore: Send + Sync {
    /// Human-readable name for logs (e.g. `"memory"`, `"postgres"`).
    fn store_name(&self) -> &'static str;

    async fn find_by_key(&self, txid: &str) -> Result<Option<DepositRecord>>;

    async fn find_by_filter(&self, filter: &DepositFilter) -> Result<Vec<DepositRecord>>;

    async fn insert(&mut self, record: &DepositRecord) -> Result<()>;

    /// Errors if no record exists for `txid`.
    async fn update_fields(&mut self, txid: &str, update: &DepositUpdate) -> Result<()>;

    /// Errors if no record exists for `txid`.
    async fn delete_by_key(&mut self, txid: &str) -> Result<()>;
}
