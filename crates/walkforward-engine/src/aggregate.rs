use factor_stats::{max_drawdown, mean, spearman, stddev};
use research_core::{
    BacktestConfig, MonthlyMetrics, Outcome, RegimeBreakdown, RunSummary, SizeRegime,
};

use crate::monthly::{calibration, hit_rate};

/// Minimum pooled outcomes for a size regime to get its own breakdown row.
const MIN_REGIME_OUTCOMES: usize = 10;

/// Roll all monthly metrics and the pooled outcome set up into the run-level
/// report.
pub fn aggregate(
    run_id: &str,
    config: &BacktestConfig,
    monthly: &[MonthlyMetrics],
    outcomes: &[Outcome],
) -> RunSummary {
    let ics: Vec<f64> = monthly.iter().map(|m| m.ic).collect();
    let ic_mean = mean(&ics);
    let ic_std = stddev(&ics);
    let icir = if ic_std == 0.0 { 0.0 } else { ic_mean / ic_std };
    let ic_positive_share = if monthly.is_empty() {
        0.0
    } else {
        monthly.iter().filter(|m| m.ic > 0.0).count() as f64 / monthly.len() as f64
    };

    // Each month's long-short return is one period of the portfolio series.
    let ls_returns: Vec<f64> = monthly.iter().map(|m| m.long_short_return).collect();
    let total_ls = ls_returns.iter().sum::<f64>();
    let n_months = monthly.len();
    let annualized_ls = if n_months == 0 {
        0.0
    } else {
        total_ls * 12.0 / n_months as f64
    };
    let ls_std = stddev(&ls_returns);
    let sharpe = if ls_std == 0.0 {
        0.0
    } else {
        mean(&ls_returns) / ls_std * 12.0_f64.sqrt()
    };

    let (calibration_90, calibration_50) = calibration(outcomes);

    RunSummary {
        run_id: run_id.to_string(),
        model_version: config.model_version.clone(),
        config: config.clone(),
        start_month: monthly.iter().map(|m| m.month).min(),
        end_month: monthly.iter().map(|m| m.month).max(),
        n_months,
        n_outcomes: outcomes.len(),
        ic_mean,
        ic_std,
        icir,
        ic_positive_share,
        total_long_short_return: total_ls,
        annualized_long_short_return: annualized_ls,
        sharpe,
        max_drawdown: max_drawdown(&ls_returns),
        calibration_90,
        calibration_50,
        regimes: regime_breakdown(outcomes),
    }
}

/// Per-size-regime statistics over the pooled outcome set. Per-regime
/// quintiles are never formed, so the long/short split is a simple sign
/// split: mean actual where the model was long minus mean actual where it
/// was flat-or-short.
fn regime_breakdown(outcomes: &[Outcome]) -> Vec<RegimeBreakdown> {
    [SizeRegime::Small, SizeRegime::Mid, SizeRegime::Large]
        .into_iter()
        .filter_map(|regime| {
            let pooled: Vec<&Outcome> = outcomes
                .iter()
                .filter(|o| o.prediction.size_regime == Some(regime) && o.is_resolved())
                .collect();
            if pooled.len() < MIN_REGIME_OUTCOMES {
                return None;
            }

            let predictions: Vec<f64> =
                pooled.iter().map(|o| o.prediction.point_estimate).collect();
            let actuals: Vec<f64> = pooled.iter().filter_map(|o| o.actual_return).collect();

            let long: Vec<f64> = pooled
                .iter()
                .filter(|o| o.prediction.point_estimate > 0.0)
                .filter_map(|o| o.actual_return)
                .collect();
            let short: Vec<f64> = pooled
                .iter()
                .filter(|o| o.prediction.point_estimate <= 0.0)
                .filter_map(|o| o.actual_return)
                .collect();

            Some(RegimeBreakdown {
                regime,
                n_outcomes: pooled.len(),
                ic: spearman(&predictions, &actuals),
                hit_rate: hit_rate(pooled.iter().copied()),
                long_short_spread: mean(&long) - mean(&short),
            })
        })
        .collect()
}
