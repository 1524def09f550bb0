use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    CrossSectionStats, DateCoverage, FactorSnapshot, MonthlyMetrics, Outcome, Prediction,
    ResearchResult, PriceBar, RunSummary,
};

/// Read-only access to the factor tables.
///
/// Query contract: `factor_snapshots` joins each technical row to the latest
/// fundamentals row with effective date on or before the evaluation date
/// (as-of join). The engine never performs this matching itself.
#[async_trait]
pub trait FactorStore: Send + Sync {
    /// Eligible-ticker counts per trading day, with `excluded` tickers and
    /// rows missing the core technical signals filtered out.
    async fn coverage(&self, excluded: &[String]) -> ResearchResult<Vec<DateCoverage>>;

    /// All tickers' factor snapshots for one date.
    async fn factor_snapshots(&self, date: NaiveDate) -> ResearchResult<Vec<FactorSnapshot>>;
}

/// Read-only access to the adjusted price series.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// The first `limit` bars with positive adjusted close on or after
    /// `start`, ordered ascending by date.
    async fn prices_from(
        &self,
        ticker: &str,
        start: NaiveDate,
        limit: usize,
    ) -> ResearchResult<Vec<PriceBar>>;
}

/// The prediction model, consumed as a pure function of its inputs.
///
/// This is the engine's single injection seam: tests swap in a deterministic
/// stub, production wires the HTTP client against the ml-service.
#[async_trait]
pub trait PredictionModel: Send + Sync {
    async fn predict(
        &self,
        factors: &FactorSnapshot,
        stats: &CrossSectionStats,
    ) -> ResearchResult<Prediction>;
}

/// Append-only run persistence with conflict-skip idempotency: rewriting an
/// already-stored (run, ticker, date) outcome or (run, month) row is a no-op.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn save_outcomes(&self, run_id: &str, outcomes: &[Outcome]) -> ResearchResult<()>;

    async fn save_monthly(&self, run_id: &str, monthly: &[MonthlyMetrics]) -> ResearchResult<()>;

    async fn save_summary(&self, summary: &RunSummary) -> ResearchResult<()>;
}
