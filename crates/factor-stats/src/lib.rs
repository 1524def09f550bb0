//! Pure statistics kernel for cross-sectional signal evaluation.
//!
//! No I/O, no allocation beyond the returned vectors. Degenerate inputs
//! (too few observations, zero variance, empty series) return neutral zeros
//! rather than erroring — those are "no signal" states, not failures.

/// Map each value to its 1-based rank among the set, averaging ranks over
/// tied spans (mid-rank). Output is indexed to the input order.
pub fn rank(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j < n && indexed[j].1 == indexed[i].1 {
            j += 1;
        }
        // 1-based average rank over the tied span [i, j)
        let avg_rank = (i + j + 1) as f64 / 2.0;
        for k in i..j {
            ranks[indexed[k].0] = avg_rank;
        }
        i = j;
    }

    ranks
}

/// Sample Pearson correlation. Returns 0 for fewer than 3 pairs or when
/// either series has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 3 {
        return 0.0;
    }

    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }

    cov / (var_x.sqrt() * var_y.sqrt())
}

/// Spearman rank correlation: Pearson over mid-ranks. This is the
/// information coefficient used throughout the engine.
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    pearson(&rank(x), &rank(y))
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1 denominator); 0 for fewer than 2 values.
pub fn stddev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

/// Maximum drawdown of an additively cumulated return series: the most
/// negative (cumulative − running peak) observed. 0 for an empty series;
/// always <= 0.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut cumulative = 0.0;
    let mut peak = 0.0;
    let mut max_dd = 0.0;
    for r in returns {
        cumulative += r;
        if cumulative > peak {
            peak = cumulative;
        }
        let dd = cumulative - peak;
        if dd < max_dd {
            max_dd = dd;
        }
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_simple() {
        assert_eq!(rank(&[30.0, 10.0, 20.0]), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_rank_ties_get_average_rank() {
        // The two 3's occupy positions 2 and 3 → both rank 2.5
        assert_eq!(rank(&[5.0, 3.0, 3.0, 1.0]), vec![4.0, 2.5, 2.5, 1.0]);
    }

    #[test]
    fn test_rank_all_tied() {
        assert_eq!(rank(&[7.0, 7.0, 7.0]), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_pearson_perfect() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_too_few_pairs() {
        assert_eq!(pearson(&[1.0, 2.0], &[3.0, 4.0]), 0.0);
    }

    #[test]
    fn test_pearson_zero_variance() {
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_spearman_self_is_one() {
        let x = [0.3, -1.2, 4.5, 0.0, 2.2];
        assert!((spearman(&x, &x) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_spearman_bounds() {
        let x = [1.0, 5.0, 2.0, 4.0, 3.0];
        let y = [0.02, -0.01, 0.03, 0.01, -0.02];
        let rho = spearman(&x, &y);
        assert!((-1.0..=1.0).contains(&rho));
    }

    #[test]
    fn test_spearman_monotone_nonlinear() {
        // Monotone but nonlinear: rank correlation is still exactly 1
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 8.0, 27.0, 64.0, 125.0];
        assert!((spearman(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_and_stddev() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[2.0, 4.0]), 3.0);
        assert_eq!(stddev(&[1.0]), 0.0);
        assert!((stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.138089935299395).abs() < 1e-12);
    }

    #[test]
    fn test_max_drawdown_empty() {
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn test_max_drawdown_monotone_up() {
        assert_eq!(max_drawdown(&[0.01, 0.02, 0.03]), 0.0);
    }

    #[test]
    fn test_max_drawdown_peak_to_trough() {
        // Peak at +0.05, trough at -0.05 → drawdown -0.10
        let dd = max_drawdown(&[0.05, -0.04, -0.06, 0.03]);
        assert!((dd + 0.10).abs() < 1e-12);
    }
}
