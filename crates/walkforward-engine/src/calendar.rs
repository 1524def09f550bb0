use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use research_core::DateCoverage;

/// Derive the rebalance calendar: for each calendar month keep the latest
/// trading date, then drop months whose eligible coverage is below
/// `min_tickers`. Output is ascending and deduplicated.
pub fn rebalance_dates(coverage: &[DateCoverage], min_tickers: usize) -> Vec<NaiveDate> {
    let mut latest_per_month: BTreeMap<(i32, u32), &DateCoverage> = BTreeMap::new();
    for c in coverage {
        let key = (c.date.year(), c.date.month());
        match latest_per_month.get(&key) {
            Some(current) if current.date >= c.date => {}
            _ => {
                latest_per_month.insert(key, c);
            }
        }
    }

    latest_per_month
        .values()
        .filter(|c| c.n_tickers >= min_tickers)
        .map(|c| c.date)
        .collect()
}
