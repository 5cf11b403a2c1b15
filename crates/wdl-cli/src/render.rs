use wdl_reconcile::AggregateResult;

/// Text balance report, one line per directory entry, then the
/// unreferenced bucket and the global range.
pub fn render_aggregate(res: &AggregateResult) -> String {
    let mut out = String::new();
    for a in &res.per_address {
        out.push_str(&format!(
            "Deposited for {}: count={} sum={}\n",
            a.name,
            a.count,
            a.sum_display()
        ));
    }
    out.push_str(&format!(
        "Deposited without reference: count={} sum={}\n",
        res.unreferenced.count,
        res.unreferenced.sum_display()
    ));

    let (min, max) = match res.amount_range() {
        Ok(r) => (format!("{:.8}", r.min), format!("{:.8}", r.max)),
        Err(_) => ("no data".to_string(), "no data".to_string()),
    };
    out.push_str(&format!("Smallest valid deposit: {min}\n"));
    out.push_str(&format!("Largest valid deposit: {max}\n"));
    out
}
