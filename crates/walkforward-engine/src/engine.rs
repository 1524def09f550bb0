use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use research_core::{
    BacktestConfig, FactorStore, MonthlyMetrics, Outcome, PredictionModel, PriceStore,
    ResearchError, ResearchResult, RunStore, RunSummary,
};
use tracing::{debug, info, warn};

use crate::{aggregate, calendar, forward_return, monthly, quantile, universe};

/// In-flight state of one run: append-only collections growing across the
/// date loop, owned by the pipeline and threaded explicitly — never ambient
/// module state.
#[derive(Debug, Default)]
pub struct RunAccumulator {
    pub outcomes: Vec<Outcome>,
    pub monthly: Vec<MonthlyMetrics>,
}

/// Everything a caller needs after a completed run: the persisted summary
/// plus the month-by-month rows backing the textual report.
#[derive(Debug)]
pub struct RunOutput {
    pub summary: RunSummary,
    pub monthly: Vec<MonthlyMetrics>,
}

/// The walk-forward pipeline. Dates are evaluated strictly sequentially so
/// look-ahead can never leak across a date boundary; within one date,
/// per-ticker prediction and return resolution run through a bounded
/// concurrent stream purely for throughput.
pub struct WalkForwardEngine {
    factors: Arc<dyn FactorStore>,
    prices: Arc<dyn PriceStore>,
    model: Arc<dyn PredictionModel>,
    runs: Arc<dyn RunStore>,
    config: BacktestConfig,
}

impl WalkForwardEngine {
    pub fn new(
        factors: Arc<dyn FactorStore>,
        prices: Arc<dyn PriceStore>,
        model: Arc<dyn PredictionModel>,
        runs: Arc<dyn RunStore>,
        config: BacktestConfig,
    ) -> Self {
        Self {
            factors,
            prices,
            model,
            runs,
            config,
        }
    }

    /// Run the backtest end to end and persist outcomes, monthly metrics and
    /// the run summary. A fresh run id is minted per invocation; a failed run
    /// is abandoned (no summary row), never resumed.
    pub async fn run(&self) -> ResearchResult<RunOutput> {
        self.validate_config()?;

        let run_id = format!("wf-{}", Utc::now().format("%Y%m%d%H%M%S%3f"));
        info!(
            %run_id,
            model_version = %self.config.model_version,
            forward_days = self.config.forward_days,
            "starting walk-forward run"
        );

        let coverage = self.factors.coverage(&self.config.excluded_tickers).await?;
        let dates = calendar::rebalance_dates(&coverage, self.config.min_tickers_per_month);
        if dates.is_empty() {
            return Err(ResearchError::NoRebalanceDates {
                min_tickers: self.config.min_tickers_per_month,
            });
        }
        info!(%run_id, n_dates = dates.len(), "rebalance calendar derived");

        let mut acc = RunAccumulator::default();
        for date in &dates {
            self.evaluate_date(*date, &mut acc).await?;
        }

        let summary = aggregate::aggregate(&run_id, &self.config, &acc.monthly, &acc.outcomes);
        info!(
            %run_id,
            n_months = summary.n_months,
            n_outcomes = summary.n_outcomes,
            ic_mean = summary.ic_mean,
            "aggregation complete, persisting"
        );

        self.runs.save_outcomes(&run_id, &acc.outcomes).await?;
        self.runs.save_monthly(&run_id, &acc.monthly).await?;
        self.runs.save_summary(&summary).await?;

        Ok(RunOutput {
            summary,
            monthly: acc.monthly,
        })
    }

    /// One iteration of the date loop: load universe, predict, resolve
    /// forward returns, bucket quintiles, compile the month.
    async fn evaluate_date(&self, date: NaiveDate, acc: &mut RunAccumulator) -> ResearchResult<()> {
        let snapshots = self.factors.factor_snapshots(date).await?;
        let eligible = universe::eligible_universe(snapshots, &self.config.excluded_tickers);
        // Coverage counts technical rows only; fundamentals eligibility can
        // still shrink the cross-section below the floor.
        if eligible.len() < self.config.min_tickers_per_month {
            debug!(
                %date,
                eligible = eligible.len(),
                "cross-section below minimum, skipping date"
            );
            return Ok(());
        }

        let stats = universe::cross_section_stats(date, &eligible);
        let horizon = self.config.forward_days;

        let mut outcomes: Vec<Outcome> = stream::iter(eligible.iter().map(|snapshot| {
            let stats = &stats;
            async move {
                let prediction = self.model.predict(snapshot, stats).await?;
                let mut outcome = Outcome::unresolved(snapshot.ticker.clone(), date, prediction);
                if let Some(resolved) =
                    forward_return::resolve(self.prices.as_ref(), &snapshot.ticker, date, horizon)
                        .await?
                {
                    outcome.resolve(resolved.actual, resolved.target_date);
                }
                Ok::<Outcome, ResearchError>(outcome)
            }
        }))
        .buffer_unordered(self.config.resolve_concurrency.max(1))
        .try_collect()
        .await?;

        // The concurrent stream completes out of order; restore determinism.
        outcomes.sort_by(|a, b| a.ticker.cmp(&b.ticker));

        let (mut resolved, unresolved): (Vec<Outcome>, Vec<Outcome>) =
            outcomes.into_iter().partition(Outcome::is_resolved);

        quantile::assign_quintiles(&mut resolved);

        match monthly::compile(date, &resolved) {
            Some(metrics) => {
                info!(
                    %date,
                    universe = eligible.len(),
                    resolved = resolved.len(),
                    ic = metrics.ic,
                    long_short = metrics.long_short_return,
                    "month compiled"
                );
                acc.monthly.push(metrics);
            }
            None => {
                warn!(
                    %date,
                    universe = eligible.len(),
                    resolved = resolved.len(),
                    "fewer than 5 resolved outcomes, month dropped"
                );
            }
        }

        acc.outcomes.extend(resolved);
        acc.outcomes.extend(unresolved);
        Ok(())
    }

    fn validate_config(&self) -> ResearchResult<()> {
        if self.config.forward_days == 0 {
            return Err(ResearchError::InvalidConfig(
                "forward horizon must be at least 1 trading session".to_string(),
            ));
        }
        if self.config.min_tickers_per_month == 0 {
            return Err(ResearchError::InvalidConfig(
                "minimum tickers per month must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
