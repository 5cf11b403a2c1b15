use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};
use wdl_schemas::{DepositRecord, Snapshot};

use crate::snapshot_adapter::check_observation;
use crate::{
    DepositFilter, DepositStore, DepositUpdate, ReconcileError, ReconcilePolicy, RejectReason,
    RejectedObservation, SnapshotAdapterError, SnapshotReport,
};

/// Validate a typed snapshot before any store access.
pub fn validate_snapshot(snapshot: &Snapshot) -> Result<(), SnapshotAdapterError> {
    for (index, obs) in snapshot.transactions.iter().enumerate() {
        check_observation(index, obs)?;
    }
    Ok(())
}

/// Apply one snapshot to the store.
///
/// Step A (advance/age pending records) runs to completion before Step B
/// (ingest observations) starts, so Step B compares against post-aging state.
/// Any store failure aborts immediately; the caller must not feed further
/// snapshots to the same ledger.
pub async fn apply_snapshot<S>(
    store: &mut S,
    snapshot: &Snapshot,
    policy: &ReconcilePolicy,
) -> Result<SnapshotReport, ReconcileError>
where
    S: DepositStore + ?Sized,
{
    validate_snapshot(snapshot)?;

    let mut report = SnapshotReport {
        observed: snapshot.transactions.len(),
        ..SnapshotReport::default()
    };

    let held = advance_pending(store, snapshot, policy, &mut report).await?;
    ingest_observations(store, snapshot, &held, &mut report).await?;

    info!(
        store = store.store_name(),
        observed = report.observed,
        pending_before = report.pending_before,
        advanced = report.advanced,
        aged_out = report.aged_out,
        inserted = report.inserted,
        updated = report.updated,
        duplicate = report.duplicate,
        superseded = report.superseded,
        rejected = report.rejected.len(),
        "snapshot applied"
    );

    Ok(report)
}

// ---------------------------------------------------------------------------
// Step A
// ---------------------------------------------------------------------------

/// Returns the txids of pending records held because the snapshot only
/// reported them with a negative depth.
async fn advance_pending<S>(
    store: &mut S,
    snapshot: &Snapshot,
    policy: &ReconcilePolicy,
    report: &mut SnapshotReport,
) -> Result<HashSet<String>, ReconcileError>
where
    S: DepositStore + ?Sized,
{
    let threshold = policy.finality_threshold;
    let pending = store
        .find_by_filter(&DepositFilter::pending(threshold))
        .await
        .map_err(|e| ReconcileError::store("find_pending", None, e))?;
    report.pending_before = pending.len();

    // Last non-negative occurrence wins when a txid repeats inside one snapshot.
    let mut latest: HashMap<&str, &DepositRecord> = HashMap::new();
    let mut conflicted: HashSet<&str> = HashSet::new();
    for t in &snapshot.transactions {
        if t.is_conflicted() {
            conflicted.insert(t.txid.as_str());
        } else {
            latest.insert(t.txid.as_str(), t);
        }
    }

    let mut held = HashSet::new();
    for rec in &pending {
        let update = match latest.get(rec.txid.as_str()) {
            Some(obs) => {
                report.advanced += 1;
                DepositUpdate::Replace((*obs).clone())
            }
            None if conflicted.contains(rec.txid.as_str()) => {
                // Never write a negative depth; Step B reports the observation.
                warn!(
                    txid = %rec.txid,
                    "pending deposit reported as conflicted; record left unchanged"
                );
                report.conflicted_held += 1;
                held.insert(rec.txid.clone());
                continue;
            }
            None => {
                report.aged_out += 1;
                DepositUpdate::SetConfirmations(threshold)
            }
        };

        debug!(
            txid = %rec.txid,
            from = rec.confirmations,
            to = update.resulting_confirmations(),
            "pending deposit updated"
        );
        store
            .update_fields(&rec.txid, &update)
            .await
            .map_err(|e| ReconcileError::store("update_fields", Some(&rec.txid), e))?;
    }

    Ok(held)
}

// ---------------------------------------------------------------------------
// Step B
// ---------------------------------------------------------------------------

async fn ingest_observations<S>(
    store: &mut S,
    snapshot: &Snapshot,
    held: &HashSet<String>,
    report: &mut SnapshotReport,
) -> Result<(), ReconcileError>
where
    S: DepositStore + ?Sized,
{
    let mut last_valid: HashMap<&str, usize> = HashMap::new();
    for (position, t) in snapshot.transactions.iter().enumerate() {
        if !t.is_conflicted() {
            last_valid.insert(t.txid.as_str(), position);
        }
    }

    for (position, obs) in snapshot.transactions.iter().enumerate() {
        if obs.is_conflicted() {
            let reason = if held.contains(&obs.txid) {
                RejectReason::ConflictedPending
            } else {
                RejectReason::NegativeConfirmations
            };
            reject(report, position, obs, reason);
            continue;
        }
        if last_valid.get(obs.txid.as_str()) != Some(&position) {
            debug!(txid = %obs.txid, position, "observation superseded later in snapshot");
            report.superseded += 1;
            continue;
        }

        let existing = store
            .find_by_key(&obs.txid)
            .await
            .map_err(|e| ReconcileError::store("find_by_key", Some(&obs.txid), e))?;

        match existing {
            Some(rec) if rec.blockhash == obs.blockhash => {
                report.duplicate += 1;
            }
            Some(rec) => {
                info!(
                    txid = %obs.txid,
                    old_blockhash = %rec.blockhash,
                    new_blockhash = %obs.blockhash,
                    old_confirmations = rec.confirmations,
                    new_confirmations = obs.confirmations,
                    "blockhash changed; replacing deposit"
                );
                store
                    .delete_by_key(&obs.txid)
                    .await
                    .map_err(|e| ReconcileError::store("delete_by_key", Some(&obs.txid), e))?;
                store
                    .insert(obs)
                    .await
                    .map_err(|e| ReconcileError::store("insert", Some(&obs.txid), e))?;
                report.updated += 1;
            }
            None => {
                debug!(txid = %obs.txid, address = %obs.address, "new deposit");
                store
                    .insert(obs)
                    .await
                    .map_err(|e| ReconcileError::store("insert", Some(&obs.txid), e))?;
                report.inserted += 1;
            }
        }
    }

    Ok(())
}

fn reject(
    report: &mut SnapshotReport,
    position: usize,
    obs: &DepositRecord,
    reason: RejectReason,
) {
    warn!(
        txid = %obs.txid,
        address = %obs.address,
        confirmations = obs.confirmations,
        reason = reason.as_str(),
        "observation rejected"
    );
    report
        .rejected
        .push(RejectedObservation::new(position, obs, reason));
}
