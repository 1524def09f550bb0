use research_core::Outcome;

/// Assign prediction quintiles to one month's resolved outcomes.
///
/// Sorted ascending by point estimate (stable, so tied predictions keep
/// insertion order): quintile 1 holds the lowest predicted returns (the short
/// bucket), quintile 5 the highest (the long bucket). Groups are ⌊n/5⌋ wide;
/// the remainder lands in the top group. Fewer than 5 members cannot form
/// five groups — everyone goes to quintile 3, which keeps a tiny month from
/// fabricating a long-short signal.
pub fn assign_quintiles(outcomes: &mut [Outcome]) {
    let n = outcomes.len();
    if n == 0 {
        return;
    }
    if n < 5 {
        for o in outcomes.iter_mut() {
            o.quintile = Some(3);
        }
        return;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        outcomes[a]
            .prediction
            .point_estimate
            .partial_cmp(&outcomes[b].prediction.point_estimate)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let group_size = n / 5;
    for (position, &idx) in order.iter().enumerate() {
        let quintile = (position / group_size + 1).min(5) as u8;
        outcomes[idx].quintile = Some(quintile);
    }
}
