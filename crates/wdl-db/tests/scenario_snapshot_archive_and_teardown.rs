//! Scenario: raw wallet replies are archived per run and teardown clears them
//!
//! # Invariants under test
//!
//! 1. Archived payloads come back verbatim in snapshot order.
//! 2. (run_id, snapshot_index) is unique.
//! 3. Teardown leaves both tables empty but present.
//!
//! DB-backed test. Skips if `WDL_DATABASE_URL` is not set.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wdl_db::NewSnapshotResponse;
use wdl_reconcile::{DepositRecord, DepositStore};

#[tokio::test]
async fn archive_then_teardown() -> anyhow::Result<()> {
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

    let run_id = Uuid::new_v4();
    let docs = [
        json!({"transactions": [], "lastblock": "b1"}),
        json!({"transactions": [{"txid": "t", "address": "X", "amount": 1.0, "confirmations": 1}]}),
    ];

    // Insert out of order; fetch must restore replay order.
    for (i, doc) in docs.iter().enumerate().rev() {
        wdl_db::insert_snapshot_response(
            &pool,
            &NewSnapshotResponse {
                response_id: Uuid::new_v4(),
                run_id,
                snapshot_index: i as i32 + 1,
                received_at_utc: Utc::now(),
                payload: doc.clone(),
            },
        )
        .await?;
    }

    let back = wdl_db::fetch_snapshot_responses(&pool, run_id).await?;
    assert_eq!(back, docs.to_vec());

    let dup = wdl_db::insert_snapshot_response(
        &pool,
        &NewSnapshotResponse {
            response_id: Uuid::new_v4(),
            run_id,
            snapshot_index: 1,
            received_at_utc: Utc::now(),
            payload: json!({}),
        },
    )
    .await;
    assert!(dup.is_err(), "same run/index must be refused");

    let mut store = wdl_db::PgDepositStore::new(pool.clone());
    store
        .insert(&DepositRecord::new("t", "X", 1.0, "b1", 1))
        .await?;
    assert_eq!(wdl_db::status(&pool).await?.deposit_count, 1);

    wdl_db::teardown(&pool).await?;

    let st = wdl_db::status(&pool).await?;
    assert!(st.has_deposits_table);
    assert_eq!(st.deposit_count, 0);
    assert!(wdl_db::fetch_snapshot_responses(&pool, run_id)
        .await?
        .is_empty());

    Ok(())
}
