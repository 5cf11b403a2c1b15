//! Scenario: file feed → ledger run → journal → aggregate, all green
//!
//! # Invariants under test
//!
//! 1. The Alice scenario: a depth-2 deposit ages to 6 on an empty snapshot
//!    and aggregates as `{Alice, 1, 1.00000000}`.
//! 2. A mixed two-snapshot wallet lands in the expected final ledger:
//!    pending records advance in Step A, unchanged blockhashes count as
//!    duplicates in Step B, negative observations are rejected.
//! 3. The journal holds one SNAPSHOT_APPLIED per snapshot, one
//!    OBSERVATION_REJECTED per rejection, one AGGREGATE_COMPUTED, and
//!    verifies.

use uuid::Uuid;
use wdl_audit::{verify_chain, RunJournal, VerifyResult};
use wdl_feed::{load_directory, FileSnapshotFeed, SnapshotFeed};
use wdl_reconcile::*;
use wdl_testkit::ReplayFixture;

async fn replay(
    fx: &ReplayFixture,
    journal: Option<&mut RunJournal>,
) -> (LedgerRun<MemoryDepositStore>, Vec<SnapshotReport>) {
    let mut run = LedgerRun::new(MemoryDepositStore::new(), ReconcilePolicy::default());
    let mut feed = FileSnapshotFeed::new(fx.snapshots.clone());
    let mut reports = Vec::new();
    let mut journal = journal;

    while let Some(item) = feed.next_document().await.unwrap() {
        let report = run.apply_raw(&item.payload).await.unwrap();
        if let Some(j) = journal.as_deref_mut() {
            j.snapshot_applied(item.index, &report).unwrap();
            for r in &report.rejected {
                j.observation_rejected(item.index, r).unwrap();
            }
        }
        reports.push(report);
    }
    (run, reports)
}

#[tokio::test]
async fn alice_deposit_ages_out_and_is_attributed() {
    let fx = ReplayFixture::alice_ages_out().unwrap();
    let (run, reports) = replay(&fx, None).await;

    assert_eq!(reports[0].inserted, 1);
    assert_eq!(reports[1].pending_before, 1);
    assert_eq!(reports[1].aged_out, 1);
    assert_eq!(run.store().get("a").unwrap().confirmations, 6);

    let dir = load_directory(&fx.directory).unwrap();
    let res = run.aggregate(&dir).await.unwrap();
    assert_eq!(res.per_address.len(), 1);
    assert_eq!(res.per_address[0].name, "Alice");
    assert_eq!(res.per_address[0].count, 1);
    assert_eq!(res.per_address[0].sum_display(), "1.00000000");
    assert_eq!(res.unreferenced.count, 0);
}

#[tokio::test]
async fn mixed_wallet_final_ledger() {
    let fx = ReplayFixture::mixed_wallet().unwrap();
    let path = fx.dir.path().join("journal.jsonl");
    let mut journal = RunJournal::open(&path, Uuid::new_v4(), true).unwrap();

    let (run, reports) = replay(&fx, Some(&mut journal)).await;

    // Snapshot 1: four inserts, n1 dropped.
    assert_eq!(reports[0].inserted, 4);
    assert_eq!(reports[0].rejected.len(), 1);
    assert_eq!(
        reports[0].rejected[0].reason,
        RejectReason::NegativeConfirmations
    );

    // Snapshot 2: a1 and b1 advanced in Step A, then seen as duplicates.
    assert_eq!(reports[1].pending_before, 2);
    assert_eq!(reports[1].advanced, 2);
    assert_eq!(reports[1].aged_out, 0);
    assert_eq!(reports[1].duplicate, 2);
    assert_eq!(reports[1].inserted, 1);
    assert_eq!(reports[1].updated, 0);
    assert_eq!(reports[1].rejected.len(), 1);

    let store = run.store();
    assert_eq!(store.len(), 5);
    assert_eq!(store.get("a1").unwrap().confirmations, 2);
    assert_eq!(store.get("b1").unwrap().blockhash, "b9");
    assert_eq!(store.get("b1").unwrap().confirmations, 1);
    assert!(store.get("n1").is_none());

    let dir = load_directory(&fx.directory).unwrap();
    let res = run.aggregate(&dir).await.unwrap();
    assert_eq!(res.per_address[0].count, 2);
    assert_eq!(res.per_address[0].sum_display(), "0.75000000");
    assert_eq!(res.per_address[1].count, 1);
    assert_eq!(res.per_address[1].sum_display(), "2.00000000");
    assert_eq!(res.unreferenced.count, 2);
    assert_eq!(res.unreferenced.sum_display(), "4.50000001");
    let range = res.amount_range().unwrap();
    assert_eq!(range.min, 0.00000001);
    assert_eq!(range.max, 4.5);

    journal.aggregate_computed(&res).unwrap();
    assert_eq!(run.totals().snapshots, 2);
    assert_eq!(run.totals().rejected, 2);

    // 2 applied + 2 rejected + 1 aggregate.
    assert_eq!(verify_chain(&path).unwrap(), VerifyResult::Valid { lines: 5 });
}
