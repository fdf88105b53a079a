//! Spearman rank correlation between a predicted and an actual ordering.
//!
//! Uses the tie-free formula `rho = 1 - 6 * sum(d^2) / (n * (n^2 - 1))`.
//! Only competitors present in both orderings take part. They are re-ranked
//! 1..n on each side before differencing, so runners missing from one side
//! do not shift the other side's ranks. Tied ranks or positions are not
//! corrected for, so the result is only an approximation when ties exist.

use std::collections::HashMap;

/// Minimum number of shared competitors for a correlation.
pub const MIN_OVERLAP: usize = 2;

/// Compute Spearman's rho over the competitors present in both orderings.
///
/// # Arguments
/// * `predicted` - (competitor, predicted rank) pairs
/// * `actual` - (competitor, finishing position) pairs
///
/// # Returns
/// Rho in [-1, 1] rounded to 4 decimals, or `None` when fewer than two
/// competitors overlap
pub fn correlate(predicted: &[(&str, u32)], actual: &[(&str, u32)]) -> Option<f64> {
    let predicted_ranks: HashMap<&str, u32> = predicted.iter().copied().collect();
    let actual_positions: HashMap<&str, u32> = actual.iter().copied().collect();

    // (competitor, predicted rank, actual position)
    let shared: Vec<(&str, u32, u32)> = predicted_ranks
        .iter()
        .filter_map(|(&competitor, &rank)| {
            actual_positions
                .get(competitor)
                .map(|&position| (competitor, rank, position))
        })
        .collect();

    let n = shared.len();
    if n < MIN_OVERLAP {
        return None;
    }

    let predicted_ordinal = ordinal_ranks(&shared, |&(c, rank, _)| (rank, c));
    let actual_ordinal = ordinal_ranks(&shared, |&(c, _, position)| (position, c));

    let sum_sq: f64 = shared
        .iter()
        .map(|(competitor, _, _)| {
            let d = predicted_ordinal[competitor] as f64 - actual_ordinal[competitor] as f64;
            d * d
        })
        .sum();
    let n = n as f64;
    let rho = 1.0 - (6.0 * sum_sq) / (n * (n * n - 1.0));

    Some(round4(rho))
}

/// Assign ranks 1..n to the shared competitors, ordered by `key`.
fn ordinal_ranks<'a, F>(shared: &[(&'a str, u32, u32)], key: F) -> HashMap<&'a str, usize>
where
    F: Fn(&(&'a str, u32, u32)) -> (u32, &'a str),
{
    let mut ordered: Vec<_> = shared.iter().collect();
    ordered.sort_by_key(|entry| key(*entry));
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, &(competitor, _, _))| (competitor, i + 1))
        .collect()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
