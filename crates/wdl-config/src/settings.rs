use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_FINALITY_THRESHOLD: i64 = 6;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub reconcile: ReconcileSection,
    pub feed: FeedSection,
    pub store: StoreSection,
    pub journal: JournalSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSection {
    pub finality_threshold: i64,
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            finality_threshold: DEFAULT_FINALITY_THRESHOLD,
        }
    }
}

/// Snapshot documents are applied in list order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSection {
    pub snapshots: Vec<PathBuf>,
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackend,
    /// Empty the ledger tables when the run ends. Postgres only.
    pub teardown: bool,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            teardown: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Postgres => "postgres",
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend '{other}' (memory|postgres)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalSection {
    pub path: Option<PathBuf>,
    pub hash_chain: bool,
}

impl Default for JournalSection {
    fn default() -> Self {
        Self {
            path: None,
            hash_chain: true,
        }
    }
}

impl LedgerConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: LedgerConfig =
            serde_json::from_value(v.clone()).context("CONFIG_INVALID: ledger config shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reconcile.finality_threshold < 1 {
            bail!(
                "CONFIG_INVALID: reconcile.finality_threshold must be >= 1 (got {})",
                self.reconcile.finality_threshold
            );
        }
        Ok(())
    }
}
