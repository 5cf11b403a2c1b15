use anyhow::{bail, Result};

use wdl_reconcile::{DepositFilter, DepositStore, DepositUpdate};
use wdl_schemas::DepositRecord;

/// When a [`FaultyStore`] starts failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultPlan {
    /// Never fail.
    None,
    /// Let this many writes succeed, fail every write after that.
    FailWritesAfter(usize),
    /// Fail any write touching this txid.
    FailWritesFor(String),
    /// Fail every read.
    FailReads,
}

/// Wraps a store and injects failures per [`FaultPlan`].
pub struct FaultyStore<S> {
    inner: S,
    plan: FaultPlan,
    writes_ok: usize,
    faults: usize,
}

impl<S: DepositStore> FaultyStore<S> {
    pub fn new(inner: S, plan: FaultPlan) -> Self {
        Self {
            inner,
            plan,
            writes_ok: 0,
            faults: 0,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn writes_ok(&self) -> usize {
        self.writes_ok
    }

    pub fn faults(&self) -> usize {
        self.faults
    }

    fn check_write(&mut self, op: &str, txid: &str) -> Result<()> {
        let fail = match &self.plan {
            FaultPlan::FailWritesAfter(n) => self.writes_ok >= *n,
            FaultPlan::FailWritesFor(t) => t == txid,
            FaultPlan::None | FaultPlan::FailReads => false,
        };
        if fail {
            self.faults += 1;
            bail!("injected fault: {op} txid={txid}");
        }
        Ok(())
    }

    fn check_read(&self, op: &str) -> Result<()> {
        if self.plan == FaultPlan::FailReads {
            bail!("injected fault: {op}");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S: DepositStore> DepositStore for FaultyStore<S> {
    fn store_name(&self) -> &'static str {
        "faulty"
    }

    async fn find_by_key(&self, txid: &str) -> Result<Option<DepositRecord>> {
        self.check_read("find_by_key")?;
        self.inner.find_by_key(txid).await
    }

    async fn find_by_filter(&self, filter: &DepositFilter) -> Result<Vec<DepositRecord>> {
        self.check_read("find_by_filter")?;
        self.inner.find_by_filter(filter).await
    }

    async fn insert(&mut self, record: &DepositRecord) -> Result<()> {
        self.check_write("insert", &record.txid)?;
        self.inner.insert(record).await?;
        self.writes_ok += 1;
        Ok(())
    }

    async fn update_fields(&mut self, txid: &str, update: &DepositUpdate) -> Result<()> {
        self.check_write("update_fields", txid)?;
        self.inner.update_fields(txid, update).await?;
        self.writes_ok += 1;
        Ok(())
    }

    async fn delete_by_key(&mut self, txid: &str) -> Result<()> {
        self.check_write("delete_by_key", txid)?;
        self.inner.delete_by_key(txid).await?;
        self.writes_ok += 1;
        Ok(())
    }
}
