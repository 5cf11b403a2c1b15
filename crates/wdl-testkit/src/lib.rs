//! Fixtures and fault injection for ledger scenario tests.

mod faulty_store;

pub use faulty_store::{FaultPlan, FaultyStore};

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

use wdl_schemas::Snapshot;

/// One wallet observation as it appears in a raw snapshot document.
pub fn obs(txid: &str, address: &str, amount: f64, blockhash: &str, confirmations: i64) -> Value {
    json!({
        "txid": txid,
        "address": address,
        "amount": amount,
        "blockhash": blockhash,
        "confirmations": confirmations,
        "category": "receive",
    })
}

pub fn snapshot_doc(transactions: Vec<Value>) -> Value {
    json!({ "transactions": transactions })
}

pub fn directory_doc(entries: &[(&str, &str)]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|(name, address)| json!({"name": name, "address": address}))
            .collect(),
    )
}

pub fn write_json(dir: &Path, name: &str, v: &Value) -> Result<PathBuf> {
    let path = dir.join(name);
    let s = serde_json::to_string_pretty(v).context("serialize fixture")?;
    fs::write(&path, s).with_context(|| format!("write fixture {}", path.display()))?;
    Ok(path)
}

pub fn load_snapshot_json(path: &Path) -> Result<Snapshot> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("read snapshot: {}", path.display()))?;
    let v: Value = serde_json::from_str(&s).context("parse snapshot json")?;
    wdl_reconcile::normalize_snapshot(&v).context("normalize snapshot")
}

/// Files for one replay laid out in a temp directory.
pub struct ReplayFixture {
    pub dir: tempfile::TempDir,
    pub snapshots: Vec<PathBuf>,
    pub directory: PathBuf,
}

impl ReplayFixture {
    pub fn write(docs: &[Value], directory: &Value) -> Result<Self> {
        let dir = tempfile::tempdir().context("create fixture dir")?;
        let mut snapshots = Vec::with_capacity(docs.len());
        for (i, doc) in docs.iter().enumerate() {
            snapshots.push(write_json(
                dir.path(),
                &format!("transactions-{}.json", i + 1),
                doc,
            )?);
        }
        let directory = write_json(dir.path(), "address.json", directory)?;
        Ok(Self {
            dir,
            snapshots,
            directory,
        })
    }

    /// Alice's deposit is seen at depth 2, then ages out on an empty snapshot.
    pub fn alice_ages_out() -> Result<Self> {
        Self::write(
            &[
                snapshot_doc(vec![obs("a", "X", 1.0, "b1", 2)]),
                snapshot_doc(vec![]),
            ],
            &directory_doc(&[("Alice", "X")]),
        )
    }

    /// Two snapshots covering aging, a reorg, a conflicted observation, and
    /// an address outside the directory.
    pub fn mixed_wallet() -> Result<Self> {
        Self::write(
            &[
                snapshot_doc(vec![
                    obs("a1", "X", 0.5, "b1", 1),
                    obs("a2", "X", 0.25, "b1", 7),
                    obs("b1", "Y", 2.0, "b1", 3),
                    obs("u1", "Q", 0.00000001, "b1", 10),
                    obs("n1", "Y", 9.0, "", -1),
                ]),
                snapshot_doc(vec![
                    obs("a1", "X", 0.5, "b1", 2),
                    obs("b1", "Y", 2.0, "b9", 1),
                    obs("u2", "R", 4.5, "b9", 1),
                    obs("n1", "Y", 9.0, "", -3),
                ]),
            ],
            &directory_doc(&[("Alice", "X"), ("Bob", "Y")]),
        )
    }

    pub fn snapshot_paths(&self) -> Vec<String> {
        self.snapshots
            .iter()
            .map(|p| p.display().to_string())
            .collect()
    }
}
