//! Scenario: the Postgres store behaves like the in-memory store
//!
//! # Invariants under test
//!
//! 1. Pending deposits age out to the finality threshold on the next snapshot.
//! 2. A reorged deposit is replaced whole (new blockhash, new depth).
//! 3. Negative-depth observations are rejected and never written.
//! 4. The schema itself refuses negative depth (SQLSTATE 23514).
//! 5. Unknown per-observation fields survive the jsonb round trip.
//! 6. Aggregation over the table matches aggregation over the memory store.
//!
//! DB-backed test. Skips if `WDL_DATABASE_URL` is not set.

use serde_json::json;
use wdl_db::PgDepositStore;
use wdl_reconcile::*;

#[tokio::test]
async fn pg_store_reconciles_a_snapshot_sequence() -> anyhow::Result<()> {
    let url = match std::env::var(wdl_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: WDL_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = wdl_db::connect(&url).await?;
    wdl_db::migrate(&pool).await?;
    wdl_db::teardown(&pool).await?;

    let policy = ReconcilePolicy::default();
    let mut pg = PgDepositStore::new(pool.clone());
    let mut mem = MemoryDepositStore::new();

    let snapshots = vec![
        json!({"transactions": [
            {"txid": "a", "address": "X", "amount": 1.25, "blockhash": "b1", "confirmations": 1, "category": "receive"},
            {"txid": "b", "address": "Y", "amount": 0.5, "blockhash": "b1", "confirmations": 2},
            {"txid": "n", "address": "Z", "amount": 3.0, "confirmations": -1}
        ]}),
        json!({"transactions": [
            {"txid": "b", "address": "Y", "amount": 0.5, "blockhash": "b7", "confirmations": 1}
        ]}),
        json!({"transactions": []}),
    ];

    // -----------------------------------------------------------------------
    // 1. Replay the same documents into both stores
    // -----------------------------------------------------------------------

    for doc in &snapshots {
        let snap = normalize_snapshot(doc)?;
        let from_pg = apply_snapshot(&mut pg, &snap, &policy).await?;
        let from_mem = apply_snapshot(&mut mem, &snap, &policy).await?;
        assert_eq!(from_pg, from_mem);
    }

    let rows = pg.find_by_filter(&DepositFilter::All).await?;
    assert_eq!(rows, mem.records().cloned().collect::<Vec<_>>());
    assert_eq!(rows.len(), 2);

    let a = pg.find_by_key("a").await?.expect("a recorded");
    assert_eq!(a.confirmations, 6);
    assert_eq!(a.extra.get("category"), Some(&json!("receive")));

    let b = pg.find_by_key("b").await?.expect("b recorded");
    assert_eq!(b.blockhash, "b7");
    assert_eq!(b.confirmations, 6);

    assert!(pg.find_by_key("n").await?.is_none());

    // -----------------------------------------------------------------------
    // 2. Schema-level guard against negative depth
    // -----------------------------------------------------------------------

    let err = pg
        .insert(&DepositRecord::new("bad", "X", 1.0, "b1", -3))
        .await
        .unwrap_err();
    assert!(
        err.to_string().contains("violates deposit constraints"),
        "unexpected error: {err:#}"
    );

    let err = pg
        .update_fields("a", &DepositUpdate::SetConfirmations(-1))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("violates deposit constraints"));
    assert_eq!(pg.find_by_key("a").await?.map(|r| r.confirmations), Some(6));

    // -----------------------------------------------------------------------
    // 3. Key-level errors
    // -----------------------------------------------------------------------

    assert!(pg.insert(&a).await.is_err(), "duplicate txid must fail");
    assert!(pg.delete_by_key("missing").await.is_err());
    assert!(pg
        .update_fields("missing", &DepositUpdate::SetConfirmations(1))
        .await
        .is_err());

    // -----------------------------------------------------------------------
    // 4. Aggregation
    // -----------------------------------------------------------------------

    let dir = vec![DirectoryEntry::new("Alice", "X")];
    let res = aggregate_store(&pg, &dir).await?;
    assert_eq!(res, aggregate_store(&mem, &dir).await?);
    assert_eq!(res.per_address[0].sum_display(), "1.25000000");
    assert_eq!(res.unreferenced.count, 1);

    let empty_dir = aggregate_store(&pg, &[]).await?;
    assert_eq!(empty_dir.unreferenced.count, 2);

    wdl_db::teardown(&pool).await?;
    Ok(())
}
