use std::collections::BTreeMap;

use anyhow::{bail, Result};
use wdl_schemas::DepositRecord;

use crate::{DepositFilter, DepositStore, DepositUpdate};

/// In-process store keyed by txid.
///
/// Used for dry-run replays and tests. Enforces the same invariants the
/// Postgres schema enforces (unique txid, non-negative depth).
#[derive(Clone, Debug, Default)]
pub struct MemoryDepositStore {
    records: BTreeMap<String, DepositRecord>,
}

impl MemoryDepositStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from existing records (tests, restored ledgers).
    pub fn from_records(records: impl IntoIterator<Item = DepositRecord>) -> Result<Self> {
        let mut store = Self::new();
        for rec in records {
            store.insert_checked(rec)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, txid: &str) -> Option<&DepositRecord> {
        self.records.get(txid)
    }

    pub fn records(&self) -> impl Iterator<Item = &DepositRecord> {
        self.records.values()
    }

    fn insert_checked(&mut self, rec: DepositRecord) -> Result<()> {
        if rec.is_conflicted() {
            bail!(
                "refusing to store txid '{}' with negative confirmations {}",
                rec.txid,
                rec.confirmations
            );
        }
        if self.records.contains_key(&rec.txid) {
            bail!("duplicate txid '{}'", rec.txid);
        }
        self.records.insert(rec.txid.clone(), rec);
        Ok(())
    }
}

#[async_trait::async_trait]
impl DepositStore for MemoryDepositStore {
    fn store_name(&self) -> &'static str {
        "memory"
    }

    async fn find_by_key(&self, txid: &str) -> Result<Option<DepositRecord>> {
        Ok(self.records.get(txid).cloned())
    }

    async fn find_by_filter(&self, filter: &DepositFilter) -> Result<Vec<DepositRecord>> {
        Ok(self
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn insert(&mut self, record: &DepositRecord) -> Result<()> {
        self.insert_checked(record.clone())
    }

    async fn update_fields(&mut self, txid: &str, update: &DepositUpdate) -> Result<()> {
        if update.resulting_confirmations() < 0 {
            bail!("refusing to update txid '{txid}' to negative confirmations");
        }
        match self.records.get_mut(txid) {
            Some(rec) => update.apply_to(rec),
            None => bail!("update_fields: no record for txid '{txid}'"),
        }
    }

    async fn delete_by_key(&mut self, txid: &str) -> Result<()> {
        match self.records.remove(txid) {
            Some(_) => Ok(()),
            None => bail!("delete_by_key: no record for txid '{txid}'"),
        }
    }
}
