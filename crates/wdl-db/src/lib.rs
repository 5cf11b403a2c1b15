use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod deposits;

pub use deposits::PgDepositStore;
pub use sqlx::PgPool;

pub const ENV_DB_URL: &str = "WDL_DATABASE_URL";

/// Connect to Postgres using WDL_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence + ledger size).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='deposits'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    // If schema doesn't exist yet, report 0 rather than failing.
    let deposit_count = if exists {
        let (n,): (i64,) = sqlx::query_as::<_, (i64,)>("select count(*)::bigint from deposits")
            .fetch_one(pool)
            .await
            .context("status deposit count failed")?;
        n
    } else {
        0
    };

    Ok(DbStatus {
        ok,
        has_deposits_table: exists,
        deposit_count,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_deposits_table: bool,
    pub deposit_count: i64,
}

/// Remove every deposit and archived snapshot.
///
/// Tables are truncated rather than dropped so the migration ledger stays
/// consistent with the schema.
pub async fn teardown(pool: &PgPool) -> Result<()> {
    sqlx::query("truncate table deposits, snapshot_responses")
        .execute(pool)
        .await
        .context("teardown truncate failed")?;
    Ok(())
}

/// Archive one raw wallet reply verbatim.
pub async fn insert_snapshot_response(pool: &PgPool, resp: &NewSnapshotResponse) -> Result<()> {
    sqlx::query(
        r#"
        insert into snapshot_responses (
          response_id, run_id, snapshot_index, received_at_utc, payload
        ) values (
          $1, $2, $3, $4, $5
        )
        "#,
    )
    .bind(resp.response_id)
    .bind(resp.run_id)
    .bind(resp.snapshot_index)
    .bind(resp.received_at_utc)
    .bind(&resp.payload)
    .execute(pool)
    .await
    .context("insert_snapshot_response failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewSnapshotResponse {
    pub response_id: Uuid,
    pub run_id: Uuid,
    /// 1-based position in the replay.
    pub snapshot_index: i32,
    pub received_at_utc: DateTime<Utc>,
    pub payload: Value,
}

/// Archived replies for a run, in replay order.
pub async fn fetch_snapshot_responses(pool: &PgPool, run_id: Uuid) -> Result<Vec<Value>> {
    let rows: Vec<(Value,)> = sqlx::query_as::<_, (Value,)>(
        r#"
        select payload
        from snapshot_responses
        where run_id = $1
        order by snapshot_index asc
        "#,
    )
    .bind(run_id)
    .fetch_all(pool)
    .await
    .context("fetch_snapshot_responses failed")?;

    Ok(rows.into_iter().map(|(v,)| v).collect())
}

/// Detect a Postgres unique constraint violation (SQLSTATE 23505).
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// Detect a Postgres check constraint violation (SQLSTATE 23514).
pub(crate) fn is_check_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23514"),
        _ => false,
    }
}
