use tracing::debug;
use wdl_schemas::{DepositRecord, DirectoryEntry};

use crate::{
    AddressTotals, AggregateResult, AmountRange, BucketTotals, DepositFilter, DepositStore,
    ReconcileError,
};

/// Count and exact sum of a record set.
pub fn totals<'a>(
    records: impl IntoIterator<Item = &'a DepositRecord>,
) -> Result<BucketTotals, ReconcileError> {
    let mut t = BucketTotals::default();
    for rec in records {
        t.add(rec)?;
    }
    Ok(t)
}

/// Min/max deposit amount. Errors on an empty set instead of inventing a value.
pub fn amount_range<'a>(
    records: impl IntoIterator<Item = &'a DepositRecord>,
) -> Result<AmountRange, ReconcileError> {
    let mut range: Option<AmountRange> = None;
    for rec in records {
        range = Some(match range {
            None => AmountRange {
                min: rec.amount,
                max: rec.amount,
            },
            Some(r) => AmountRange {
                min: r.min.min(rec.amount),
                max: r.max.max(rec.amount),
            },
        });
    }
    range.ok_or(ReconcileError::EmptyAggregationSet)
}

fn directory_addresses(directory: &[DirectoryEntry]) -> Vec<String> {
    let mut addrs: Vec<String> = directory.iter().map(|e| e.address.clone()).collect();
    addrs.sort();
    addrs.dedup();
    addrs
}

/// Aggregate an in-memory record set.
///
/// Each directory entry is aggregated independently, so a repeated address
/// is reported once per entry.
pub fn aggregate(
    records: &[DepositRecord],
    directory: &[DirectoryEntry],
) -> Result<AggregateResult, ReconcileError> {
    let per_address = directory
        .iter()
        .map(|entry| {
            let t = totals(records.iter().filter(|r| r.address == entry.address))?;
            Ok(AddressTotals {
                name: entry.name.clone(),
                address: entry.address.clone(),
                count: t.count,
                sum_sats: t.sum_sats,
            })
        })
        .collect::<Result<Vec<_>, ReconcileError>>()?;

    let unreferenced_filter = DepositFilter::AddressNotIn(directory_addresses(directory));
    let unreferenced = totals(records.iter().filter(|r| unreferenced_filter.matches(r)))?;

    Ok(AggregateResult {
        per_address,
        unreferenced,
        total: totals(records)?,
        range: amount_range(records).ok(),
    })
}

/// Aggregate straight from a store, one filtered query per bucket.
pub async fn aggregate_store<S>(
    store: &S,
    directory: &[DirectoryEntry],
) -> Result<AggregateResult, ReconcileError>
where
    S: DepositStore + ?Sized,
{
    let mut per_address = Vec::with_capacity(directory.len());
    for entry in directory {
        let selected = store
            .find_by_filter(&DepositFilter::AddressEq(entry.address.clone()))
            .await
            .map_err(|e| ReconcileError::store("find_by_address", None, e))?;
        let t = totals(&selected)?;
        debug!(name = %entry.name, address = %entry.address, count = t.count, "address aggregated");
        per_address.push(AddressTotals {
            name: entry.name.clone(),
            address: entry.address.clone(),
            count: t.count,
            sum_sats: t.sum_sats,
        });
    }

    let unreferenced = store
        .find_by_filter(&DepositFilter::AddressNotIn(directory_addresses(directory)))
        .await
        .map_err(|e| ReconcileError::store("find_unreferenced", None, e))?;

    let all = store
        .find_by_filter(&DepositFilter::All)
        .await
        .map_err(|e| ReconcileError::store("find_all", None, e))?;

    Ok(AggregateResult {
        per_address,
        unreferenced: totals(&unreferenced)?,
        total: totals(&all)?,
        range: amount_range(&all).ok(),
    })
}
