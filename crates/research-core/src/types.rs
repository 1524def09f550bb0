use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One ticker's factor exposure on one evaluation date.
///
/// Technical factors come from the daily factor table; fundamentals are the
/// most recent row effective on or before the evaluation date (as-of join,
/// performed by the factor store). Missing values stay `None` — absence
/// propagates, it is never coerced to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorSnapshot {
    pub ticker: String,
    pub date: NaiveDate,
    // Momentum, multiple horizons
    pub momentum_1m: Option<f64>,
    pub momentum_3m: Option<f64>,
    pub momentum_6m: Option<f64>,
    pub momentum_12m: Option<f64>,
    pub momentum_24m: Option<f64>,
    pub reversal_1w: Option<f64>,
    // Risk
    pub volatility_1m: Option<f64>,
    pub volatility_3m: Option<f64>,
    pub volatility_6m: Option<f64>,
    pub volatility_12m: Option<f64>,
    pub beta: Option<f64>,
    pub idio_volatility: Option<f64>,
    pub january_dummy: Option<f64>,
    // Fundamentals (as-of joined)
    pub book_to_market: Option<f64>,
    pub earnings_to_price: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub sales_to_price: Option<f64>,
    pub sales_growth: Option<f64>,
    pub market_cap: Option<f64>,
    pub turnover: Option<f64>,
}

impl FactorSnapshot {
    /// Whether the row carries the core signal fields the model cannot run
    /// without: short-horizon momentum and volatility, market cap, turnover.
    pub fn has_core_signals(&self) -> bool {
        self.momentum_1m.is_some()
            && self.volatility_1m.is_some()
            && self.market_cap.is_some()
            && self.turnover.is_some()
    }
}

/// Cross-sectional normalization context handed to the prediction model
/// alongside each snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossSectionStats {
    pub date: NaiveDate,
    pub n_tickers: usize,
    pub median_market_cap: f64,
    pub median_turnover: f64,
}

/// The five percentile levels bounding the predictive distribution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PercentileBand {
    pub p05: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeRegime {
    Small,
    Mid,
    Large,
}

impl SizeRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Mid => "mid",
            Self::Large => "large",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnoverRegime {
    Low,
    Mid,
    High,
}

impl TurnoverRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }
}

/// Model output for one (ticker, evaluation date). Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Expected forward log return over the configured horizon.
    pub point_estimate: f64,
    pub percentiles: PercentileBand,
    /// Model confidence in [0, 1].
    pub confidence: f64,
    pub size_regime: Option<SizeRegime>,
    pub turnover_regime: Option<TurnoverRegime>,
}

/// A prediction plus its (eventually) realized forward return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub ticker: String,
    pub date: NaiveDate,
    pub prediction: Prediction,
    /// Realized forward log return; `None` until the forward window closes.
    pub actual_return: Option<f64>,
    /// Date the forward window closed on.
    pub target_date: Option<NaiveDate>,
    /// 1 (lowest predicted) .. 5 (highest predicted); assigned per month.
    pub quintile: Option<u8>,
    /// Sign agreement between point estimate and actual. An exact zero on
    /// either side counts as correct.
    pub direction_correct: Option<bool>,
}

impl Outcome {
    pub fn unresolved(ticker: String, date: NaiveDate, prediction: Prediction) -> Self {
        Self {
            ticker,
            date,
            prediction,
            actual_return: None,
            target_date: None,
            quintile: None,
            direction_correct: None,
        }
    }

    /// Attach the realized return and derive direction correctness.
    pub fn resolve(&mut self, actual: f64, target_date: NaiveDate) {
        let predicted = self.prediction.point_estimate;
        let correct = predicted == 0.0 || actual == 0.0 || predicted.signum() == actual.signum();
        self.actual_return = Some(actual);
        self.target_date = Some(target_date);
        self.direction_correct = Some(correct);
    }

    pub fn is_resolved(&self) -> bool {
        self.actual_return.is_some()
    }
}

/// Metrics for one evaluation month, computed over resolved outcomes only.
/// A row exists only when at least 5 outcomes resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyMetrics {
    pub month: NaiveDate,
    pub n_tickers: usize,
    /// Sign agreement among outcomes with non-zero prediction and actual.
    pub hit_rate: f64,
    pub mae: f64,
    /// Information coefficient: Spearman(prediction, actual).
    pub ic: f64,
    /// Mean actual return of quintile 5 minus quintile 1.
    pub long_short_return: f64,
    /// Share of actuals inside [p05, p95].
    pub calibration_90: f64,
    /// Share of actuals inside [p25, p75].
    pub calibration_50: f64,
}

/// Per-size-regime rollup over the pooled outcome set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeBreakdown {
    pub regime: SizeRegime,
    pub n_outcomes: usize,
    pub ic: f64,
    pub hit_rate: f64,
    /// Mean actual where prediction > 0 minus mean actual where prediction <= 0.
    pub long_short_spread: f64,
}

/// Configuration for one backtest run. Persisted verbatim with the run so
/// historical runs stay interpretable without external context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Minimum eligible tickers for a month-end date to enter the calendar.
    pub min_tickers_per_month: usize,
    /// Forward horizon in trading sessions.
    pub forward_days: usize,
    pub model_version: String,
    /// Indices, ETFs and duplicate listings kept out of the cross-section.
    pub excluded_tickers: Vec<String>,
    /// Bound on concurrent per-ticker forward-return resolution.
    pub resolve_concurrency: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            min_tickers_per_month: 10,
            forward_days: 21,
            model_version: "unversioned".to_string(),
            excluded_tickers: default_exclusions(),
            resolve_concurrency: 8,
        }
    }
}

/// Oslo Børs tickers that are not single-listed common equity: index series,
/// index ETFs, and B-share duplicates of names already in the universe.
pub fn default_exclusions() -> Vec<String> {
    [
        "OSEBX", "OSEAX", "OBX", "OSEFX", // index series
        "OBXEDNB", "XACTOBX", "XACTDER", // ETFs / derivatives baskets
        "SCHB", "WWIB", "ODFB", // B-share duplicates (A-share is kept)
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Run-level report aggregated over all months and the pooled outcome set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub model_version: String,
    pub config: BacktestConfig,
    pub start_month: Option<NaiveDate>,
    pub end_month: Option<NaiveDate>,
    pub n_months: usize,
    pub n_outcomes: usize,
    pub ic_mean: f64,
    pub ic_std: f64,
    /// IC information ratio: mean / std (0 when std is 0).
    pub icir: f64,
    /// Share of months with IC > 0.
    pub ic_positive_share: f64,
    pub total_long_short_return: f64,
    pub annualized_long_short_return: f64,
    /// Monthly L/S Sharpe, annualized with sqrt(12).
    pub sharpe: f64,
    /// Most negative peak-to-trough move of the cumulative L/S series.
    pub max_drawdown: f64,
    pub calibration_90: f64,
    pub calibration_50: f64,
    pub regimes: Vec<RegimeBreakdown>,
}

/// One adjusted-close observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub adj_close: f64,
}

/// Eligible-ticker count for one trading day, exclusions already applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateCoverage {
    pub date: NaiveDate,
    pub n_tickers: usize,
}

/// A closed forward window.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedReturn {
    pub actual: f64,
    pub target_date: NaiveDate,
}
