use chrono::NaiveDate;
use factor_stats::{mean, spearman};
use research_core::{MonthlyMetrics, Outcome};

/// Compile one evaluation month's metrics from its resolved outcomes.
///
/// Returns `None` for fewer than 5 resolved outcomes — the month is dropped
/// entirely rather than reported over a degenerate cross-section.
pub fn compile(month: NaiveDate, resolved: &[Outcome]) -> Option<MonthlyMetrics> {
    if resolved.len() < 5 {
        return None;
    }

    let predictions: Vec<f64> = resolved
        .iter()
        .map(|o| o.prediction.point_estimate)
        .collect();
    let actuals: Vec<f64> = resolved.iter().filter_map(|o| o.actual_return).collect();
    debug_assert_eq!(predictions.len(), actuals.len());

    let mae = mean(
        &resolved
            .iter()
            .filter_map(|o| o.actual_return.map(|a| (o.prediction.point_estimate - a).abs()))
            .collect::<Vec<f64>>(),
    );

    let long = bucket_mean(resolved, 5);
    let short = bucket_mean(resolved, 1);

    let (cal_90, cal_50) = calibration(resolved);

    Some(MonthlyMetrics {
        month,
        n_tickers: resolved.len(),
        hit_rate: hit_rate(resolved),
        mae,
        ic: spearman(&predictions, &actuals),
        long_short_return: long - short,
        calibration_90: cal_90,
        calibration_50: cal_50,
    })
}

/// Sign agreement among outcomes where both prediction and actual are
/// non-zero. Zero-sided pairs carry no directional information and are left
/// out of the denominator.
pub(crate) fn hit_rate<'a, I>(outcomes: I) -> f64
where
    I: IntoIterator<Item = &'a Outcome>,
{
    let mut hits = 0usize;
    let mut total = 0usize;
    for o in outcomes {
        let predicted = o.prediction.point_estimate;
        let Some(actual) = o.actual_return else {
            continue;
        };
        if predicted == 0.0 || actual == 0.0 {
            continue;
        }
        total += 1;
        if predicted.signum() == actual.signum() {
            hits += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    hits as f64 / total as f64
}

/// Share of resolved outcomes whose actual return lies inside the stated 90%
/// and 50% predictive intervals. Well-calibrated models track the nominal
/// coverage; deviation is a diagnostic, not an error.
pub(crate) fn calibration<'a, I>(outcomes: I) -> (f64, f64)
where
    I: IntoIterator<Item = &'a Outcome>,
{
    let mut inside_90 = 0usize;
    let mut inside_50 = 0usize;
    let mut total = 0usize;
    for o in outcomes {
        let Some(actual) = o.actual_return else {
            continue;
        };
        let band = o.prediction.percentiles;
        total += 1;
        if actual >= band.p05 && actual <= band.p95 {
            inside_90 += 1;
        }
        if actual >= band.p25 && actual <= band.p75 {
            inside_50 += 1;
        }
    }
    if total == 0 {
        return (0.0, 0.0);
    }
    (
        inside_90 as f64 / total as f64,
        inside_50 as f64 / total as f64,
    )
}

fn bucket_mean(outcomes: &[Outcome], quintile: u8) -> f64 {
    let returns: Vec<f64> = outcomes
        .iter()
        .filter(|o| o.quintile == Some(quintile))
        .filter_map(|o| o.actual_return)
        .collect();
    // Empty bucket contributes 0, not NaN
    mean(&returns)
}
