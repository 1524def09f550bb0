use chrono::NaiveDate;
use research_core::{CrossSectionStats, FactorSnapshot};

/// Filter one date's snapshots down to the eligible cross-section: no
/// excluded tickers (indices, ETFs, duplicate listings) and all core signal
/// fields present. An empty result means "skip this date", never an error.
pub fn eligible_universe(
    snapshots: Vec<FactorSnapshot>,
    excluded: &[String],
) -> Vec<FactorSnapshot> {
    snapshots
        .into_iter()
        .filter(|s| !excluded.iter().any(|e| e == &s.ticker))
        .filter(FactorSnapshot::has_core_signals)
        .collect()
}

/// Normalization context for the model, computed over the eligible set.
pub fn cross_section_stats(date: NaiveDate, universe: &[FactorSnapshot]) -> CrossSectionStats {
    CrossSectionStats {
        date,
        n_tickers: universe.len(),
        median_market_cap: median(universe.iter().filter_map(|s| s.market_cap).collect()),
        median_turnover: median(universe.iter().filter_map(|s| s.turnover).collect()),
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
