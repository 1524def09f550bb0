use chrono::NaiveDate;
use research_core::{PriceStore, ResearchResult, ResolvedReturn};

/// Realized log return over the next `horizon` trading sessions.
///
/// Fetches the first `horizon + 1` positive-close bars on or after the
/// evaluation date. Fewer bars means the window has not closed yet — an
/// expected state near the end of the price history, reported as `None`
/// rather than an error. Non-positive endpoints also force `None` instead of
/// producing an infinite or NaN return.
pub async fn resolve(
    prices: &dyn PriceStore,
    ticker: &str,
    date: NaiveDate,
    horizon: usize,
) -> ResearchResult<Option<ResolvedReturn>> {
    let bars = prices.prices_from(ticker, date, horizon + 1).await?;
    if bars.len() < horizon + 1 {
        return Ok(None);
    }

    let entry = bars[0].adj_close;
    let exit = bars[horizon].adj_close;
    if entry <= 0.0 || exit <= 0.0 {
        return Ok(None);
    }

    Ok(Some(ResolvedReturn {
        actual: (exit / entry).ln(),
        target_date: bars[horizon].date,
    }))
}
