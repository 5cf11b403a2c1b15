use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use wdl_config::{LedgerConfig, StoreBackend, UnusedKeyPolicy};
use wdl_db::PgDepositStore;
use wdl_reconcile::{aggregate_store, AggregateResult, ReconcilePolicy};

pub mod replay;

/// Command-line values that take precedence over config layers.
#[derive(Debug, Default)]
pub struct Overrides {
    pub snapshots: Vec<String>,
    pub directory: Option<String>,
    pub store: Option<StoreBackend>,
    pub finality_threshold: Option<i64>,
    pub journal: Option<String>,
    pub keep_ledger: bool,
}

/// Everything a replay needs, after config layering and overrides.
#[derive(Debug, Clone)]
pub struct ReplaySettings {
    pub config_hash: String,
    pub policy: ReconcilePolicy,
    pub snapshots: Vec<PathBuf>,
    pub directory: PathBuf,
    pub backend: StoreBackend,
    pub teardown: bool,
    pub journal: Option<PathBuf>,
    pub hash_chain: bool,
}

pub fn resolve_settings(config_paths: &[String], ov: Overrides) -> Result<ReplaySettings> {
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = wdl_config::load_layered_yaml(&path_refs)?;

    let unused = wdl_config::report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for ptr in &unused.unused_leaf_pointers {
        warn!(key = %ptr, "config key is not read by the ledger");
    }

    let mut cfg: LedgerConfig = loaded.ledger()?;
    if !ov.snapshots.is_empty() {
        cfg.feed.snapshots = ov.snapshots.into_iter().map(PathBuf::from).collect();
    }
    if let Some(d) = ov.directory {
        cfg.feed.directory = Some(PathBuf::from(d));
    }
    if let Some(b) = ov.store {
        cfg.store.backend = b;
    }
    if let Some(t) = ov.finality_threshold {
        cfg.reconcile.finality_threshold = t;
    }
    if let Some(j) = ov.journal {
        cfg.journal.path = Some(PathBuf::from(j));
    }
    if ov.keep_ledger {
        cfg.store.teardown = false;
    }
    cfg.validate()?;

    if cfg.feed.snapshots.is_empty() {
        bail!("no snapshot documents: set feed.snapshots or pass --snapshot");
    }
    let directory = cfg
        .feed
        .directory
        .context("no address directory: set feed.directory or pass --directory")?;

    info!(
        config_hash = %loaded.config_hash,
        snapshots = cfg.feed.snapshots.len(),
        backend = cfg.store.backend.as_str(),
        finality_threshold = cfg.reconcile.finality_threshold,
        "replay settings resolved"
    );

    Ok(ReplaySettings {
        config_hash: loaded.config_hash,
        policy: ReconcilePolicy::with_threshold(cfg.reconcile.finality_threshold),
        snapshots: cfg.feed.snapshots,
        directory,
        backend: cfg.store.backend,
        teardown: cfg.store.teardown,
        journal: cfg.journal.path,
        hash_chain: cfg.journal.hash_chain,
    })
}

/// Aggregate the ledger currently held in Postgres.
pub async fn report(directory: &str) -> Result<AggregateResult> {
    let entries = wdl_feed::load_directory(Path::new(directory))?;
    let pool = wdl_db::connect_from_env().await?;
    let store = PgDepositStore::new(pool);
    let res = aggregate_store(&store, &entries).await?;
    Ok(res)
}
