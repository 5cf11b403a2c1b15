//! Migrating twice must be a no-op the second time.
//!
//! DB-backed test, skipped if WDL_DATABASE_URL is not set.

#[tokio::test]
async fn migrate_idempotent_on_clean_db() -> anyhow::Result<()> {
    let url = match std::env::var(wdl_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: WDL_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = wdl_db::connect(&url).await?;

    wdl_db::migrate(&pool).await?;
    wdl_db::migrate(&pool).await?;

    let st = wdl_db::status(&pool).await?;
    assert!(st.ok);
    assert!(st.has_deposits_table);

    Ok(())
}
