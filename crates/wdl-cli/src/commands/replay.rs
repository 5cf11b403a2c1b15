//! `wdl replay`: feed → reconcile → aggregate, with optional journal and
//! Postgres archive.
//!
//! Postgres runs start from an empty ledger and, unless `--keep-ledger` is
//! given, empty it again on every exit path, success or failure.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use wdl_audit::RunJournal;
use wdl_config::StoreBackend;
use wdl_db::{NewSnapshotResponse, PgDepositStore, PgPool};
use wdl_feed::{FileSnapshotFeed, SnapshotFeed};
use wdl_reconcile::{
    AggregateResult, DepositStore, DirectoryEntry, LedgerRun, MemoryDepositStore, RunTotals,
};

use super::ReplaySettings;

#[derive(Debug)]
pub struct ReplayOutcome {
    pub run_id: Uuid,
    pub totals: RunTotals,
    pub aggregate: AggregateResult,
}

pub async fn run(settings: &ReplaySettings) -> Result<ReplayOutcome> {
    let directory = wdl_feed::load_directory(&settings.directory)?;
    let run_id = Uuid::new_v4();
    info!(%run_id, config_hash = %settings.config_hash, "replay starting");

    let mut journal = match &settings.journal {
        Some(p) => Some(RunJournal::open(p, run_id, settings.hash_chain)?),
        None => None,
    };
    let feed = FileSnapshotFeed::new(settings.snapshots.clone());

    match settings.backend {
        StoreBackend::Memory => {
            replay_into(
                MemoryDepositStore::new(),
                settings,
                feed,
                &directory,
                journal.as_mut(),
                None,
                run_id,
            )
            .await
        }
        StoreBackend::Postgres => {
            let pool = wdl_db::connect_from_env().await?;
            wdl_db::migrate(&pool).await?;

            let st = wdl_db::status(&pool).await?;
            if st.deposit_count > 0 {
                bail!(
                    "REFUSING REPLAY: ledger already holds {} deposit(s). Run `wdl db teardown --yes` first",
                    st.deposit_count
                );
            }

            let result = replay_into(
                PgDepositStore::new(pool.clone()),
                settings,
                feed,
                &directory,
                journal.as_mut(),
                Some(&pool),
                run_id,
            )
            .await;

            if settings.teardown {
                if let Err(e) = wdl_db::teardown(&pool).await {
                    error!("teardown failed: {e:#}");
                    if result.is_ok() {
                        return Err(e);
                    }
                } else {
                    info!("ledger tables emptied");
                }
            }
            result
        }
    }
}

async fn replay_into<S, F>(
    store: S,
    settings: &ReplaySettings,
    mut feed: F,
    directory: &[DirectoryEntry],
    mut journal: Option<&mut RunJournal>,
    archive: Option<&PgPool>,
    run_id: Uuid,
) -> Result<ReplayOutcome>
where
    S: DepositStore,
    F: SnapshotFeed,
{
    let mut run = LedgerRun::new(store, settings.policy.clone());

    while let Some(item) = feed.next_document().await? {
        if let Some(pool) = archive {
            wdl_db::insert_snapshot_response(
                pool,
                &NewSnapshotResponse {
                    response_id: Uuid::new_v4(),
                    run_id,
                    snapshot_index: i32::try_from(item.index).context("snapshot index overflow")?,
                    received_at_utc: Utc::now(),
                    payload: item.payload.clone(),
                },
            )
            .await?;
        }

        let report = run
            .apply_raw(&item.payload)
            .await
            .with_context(|| format!("snapshot #{} ({})", item.index, item.origin))?;

        if let Some(j) = journal.as_deref_mut() {
            j.snapshot_applied(item.index, &report)?;
            for r in &report.rejected {
                j.observation_rejected(item.index, r)?;
            }
        }
    }

    let aggregate = run.aggregate(directory).await?;
    if let Some(j) = journal.as_deref_mut() {
        j.aggregate_computed(&aggregate)?;
    }

    let totals = run.totals().clone();
    run.finish();

    Ok(ReplayOutcome {
        run_id,
        totals,
        aggregate,
    })
}
