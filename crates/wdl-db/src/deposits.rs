// Postgres-backed deposit store.
//
// One row per txid. Uniqueness and the non-negative depth rule are enforced
// by the schema (primary key + check constraint); violations come back as
// errors the engine turns into StoreOperationFailure.

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;

use wdl_reconcile::{DepositFilter, DepositStore, DepositUpdate};
use wdl_schemas::DepositRecord;

use crate::{is_check_violation, is_unique_violation};

const SELECT_DEPOSIT: &str = r#"
    select txid, address, amount, blockhash, confirmations, extra
    from deposits
"#;

// Byte order, matching the in-memory store.
const ORDER_BY_TXID: &str = r#" order by txid collate "C" asc"#;

#[derive(Debug, Clone)]
pub struct PgDepositStore {
    pool: PgPool,
}

impl PgDepositStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_record(r: &PgRow) -> Result<DepositRecord> {
    let extra = match r.try_get::<Value, _>("extra").context("deposits.extra")? {
        Value::Object(m) => m,
        Value::Null => Map::new(),
        other => return Err(anyhow!("deposits.extra is not an object: {other}")),
    };

    Ok(DepositRecord {
        txid: r.try_get::<String, _>("txid").context("deposits.txid")?,
        address: r
            .try_get::<String, _>("address")
            .context("deposits.address")?,
        amount: r.try_get::<f64, _>("amount").context("deposits.amount")?,
        blockhash: r
            .try_get::<String, _>("blockhash")
            .context("deposits.blockhash")?,
        confirmations: r
            .try_get::<i64, _>("confirmations")
            .context("deposits.confirmations")?,
        extra,
    })
}

fn map_write_error(e: sqlx::Error, op: &str, txid: &str) -> anyhow::Error {
    if is_unique_violation(&e) {
        return anyhow!("{op}: duplicate txid '{txid}'");
    }
    if is_check_violation(&e) {
        return anyhow!("{op}: txid '{txid}' violates deposit constraints (negative depth or amount)");
    }
    anyhow::Error::new(e).context(format!("{op} failed for txid '{txid}'"))
}

#[async_trait::async_trait]
impl DepositStore for PgDepositStore {
    fn store_name(&self) -> &'static str {
        "postgres"
    }

    async fn find_by_key(&self, txid: &str) -> Result<Option<DepositRecord>> {
        let sql = format!("{SELECT_DEPOSIT} where txid = $1");
        let row = sqlx::query(&sql)
            .bind(txid)
            .fetch_optional(&self.pool)
            .await
            .context("find_by_key query failed")?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn find_by_filter(&self, filter: &DepositFilter) -> Result<Vec<DepositRecord>> {
        let rows = match filter {
            DepositFilter::All => {
                let sql = format!("{SELECT_DEPOSIT}{ORDER_BY_TXID}");
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
            DepositFilter::ConfirmationsInRange { min, max_exclusive } => {
                let sql = format!(
                    "{SELECT_DEPOSIT} where confirmations >= $1 and confirmations < $2{ORDER_BY_TXID}"
                );
                sqlx::query(&sql)
                    .bind(*min)
                    .bind(*max_exclusive)
                    .fetch_all(&self.pool)
                    .await
            }
            DepositFilter::AddressEq(address) => {
                let sql = format!("{SELECT_DEPOSIT} where address = $1{ORDER_BY_TXID}");
                sqlx::query(&sql)
                    .bind(address)
                    .fetch_all(&self.pool)
                    .await
            }
            DepositFilter::AddressNotIn(addresses) => {
                // `<> all(empty array)` is true, so an empty directory selects everything.
                let sql = format!("{SELECT_DEPOSIT} where address <> all($1){ORDER_BY_TXID}");
                sqlx::query(&sql)
                    .bind(addresses.as_slice())
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .context("find_by_filter query failed")?;

        let mut out = Vec::with_capacity(rows.len());
        for r in &rows {
            out.push(row_to_record(r)?);
        }
        Ok(out)
    }

    async fn insert(&mut self, record: &DepositRecord) -> Result<()> {
        sqlx::query(
            r#"
            insert into deposits (
              txid, address, amount, blockhash, confirmations, extra
            ) values (
              $1, $2, $3, $4, $5, $6
            )
            "#,
        )
        .bind(&record.txid)
        .bind(&record.address)
        .bind(record.amount)
        .bind(&record.blockhash)
        .bind(record.confirmations)
        .bind(Value::Object(record.extra.clone()))
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "insert", &record.txid))?;

        debug!(txid = %record.txid, "deposit row inserted");
        Ok(())
    }

    async fn update_fields(&mut self, txid: &str, update: &DepositUpdate) -> Result<()> {
        let res = match update {
            DepositUpdate::SetConfirmations(c) => {
                sqlx::query(
                    r#"
                    update deposits
                    set confirmations = $2,
                        updated_at_utc = now()
                    where txid = $1
                    "#,
                )
                .bind(txid)
                .bind(*c)
                .execute(&self.pool)
                .await
            }
            DepositUpdate::Replace(next) => {
                if next.txid != txid {
                    return Err(anyhow!(
                        "replacement txid '{}' does not match record '{}'",
                        next.txid,
                        txid
                    ));
                }
                sqlx::query(
                    r#"
                    update deposits
                    set address = $2,
                        amount = $3,
                        blockhash = $4,
                        confirmations = $5,
                        extra = $6,
                        updated_at_utc = now()
                    where txid = $1
                    "#,
                )
                .bind(txid)
                .bind(&next.address)
                .bind(next.amount)
                .bind(&next.blockhash)
                .bind(next.confirmations)
                .bind(Value::Object(next.extra.clone()))
                .execute(&self.pool)
                .await
            }
        }
        .map_err(|e| map_write_error(e, "update_fields", txid))?;

        if res.rows_affected() != 1 {
            return Err(anyhow!("update_fields: no record for txid '{txid}'"));
        }
        Ok(())
    }

    async fn delete_by_key(&mut self, txid: &str) -> Result<()> {
        let res = sqlx::query("delete from deposits where txid = $1")
            .bind(txid)
            .execute(&self.pool)
            .await
            .context("delete_by_key failed")?;

        if res.rows_affected() != 1 {
            return Err(anyhow!("delete_by_key: no record for txid '{txid}'"));
        }
        Ok(())
    }
}
