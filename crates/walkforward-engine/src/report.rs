use std::fmt::Write;

use research_core::{BacktestConfig, MonthlyMetrics, RunSummary};
use serde::{Deserialize, Serialize};

/// Machine-readable archival snapshot of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: String,
    pub config: BacktestConfig,
    pub overall: RunSummary,
    pub monthly: Vec<MonthlyMetrics>,
}

impl RunSnapshot {
    pub fn new(summary: RunSummary, monthly: Vec<MonthlyMetrics>) -> Self {
        Self {
            run_id: summary.run_id.clone(),
            config: summary.config.clone(),
            overall: summary,
            monthly,
        }
    }
}

/// Human-readable run report: month-by-month table plus headline statistics.
pub fn render_report(summary: &RunSummary, monthly: &[MonthlyMetrics]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Walk-forward run {}", summary.run_id);
    let _ = writeln!(
        out,
        "model {} | horizon {}d | min {} tickers/month",
        summary.model_version, summary.config.forward_days, summary.config.min_tickers_per_month
    );
    match (summary.start_month, summary.end_month) {
        (Some(start), Some(end)) => {
            let _ = writeln!(out, "window {start} .. {end} ({} months)", summary.n_months);
        }
        _ => {
            let _ = writeln!(out, "window: no compiled months");
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "{:<12} {:>4} {:>8} {:>8} {:>9} {:>9} {:>7} {:>7}",
        "month", "n", "IC", "hit", "L/S", "MAE", "cal90", "cal50"
    );
    for m in monthly {
        let _ = writeln!(
            out,
            "{:<12} {:>4} {:>8.4} {:>7.1}% {:>8.2}% {:>9.4} {:>6.0}% {:>6.0}%",
            m.month.to_string(),
            m.n_tickers,
            m.ic,
            m.hit_rate * 100.0,
            m.long_short_return * 100.0,
            m.mae,
            m.calibration_90 * 100.0,
            m.calibration_50 * 100.0,
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "IC mean {:.4}  std {:.4}  ICIR {:.2}  positive months {:.0}%",
        summary.ic_mean,
        summary.ic_std,
        summary.icir,
        summary.ic_positive_share * 100.0
    );
    let _ = writeln!(
        out,
        "L/S total {:.2}%  annualized {:.2}%  Sharpe {:.2}  max drawdown {:.2}%",
        summary.total_long_short_return * 100.0,
        summary.annualized_long_short_return * 100.0,
        summary.sharpe,
        summary.max_drawdown * 100.0
    );
    let _ = writeln!(
        out,
        "calibration 90% band {:.0}%  50% band {:.0}%  ({} outcomes)",
        summary.calibration_90 * 100.0,
        summary.calibration_50 * 100.0,
        summary.n_outcomes
    );

    if !summary.regimes.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "size-regime breakdown:");
        for r in &summary.regimes {
            let _ = writeln!(
                out,
                "  {:<6} n {:>5}  IC {:>7.4}  hit {:>5.1}%  L/S split {:>6.2}%",
                r.regime.as_str(),
                r.n_outcomes,
                r.ic,
                r.hit_rate * 100.0,
                r.long_short_spread * 100.0,
            );
        }
    }

    out
}
