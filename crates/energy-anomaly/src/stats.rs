//! Numeric helpers shared by the preprocessor, feature builders, and models.
//!
//! Every function treats non-finite inputs (NaN, ±Infinity) as missing and
//! skips them, the way pandas skips NaN in reductions and rolling windows.
//! Standard deviations take an explicit `ddof` so callers choose between the
//! sample (1) and population (0) estimators.

use std::cmp::Ordering;

/// Iterate over the finite values of a slice.
pub fn finite(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| v.is_finite())
}

/// Count of finite values.
pub fn finite_count(values: &[f64]) -> usize {
    finite(values).count()
}

/// Mean of the finite values, `None` when there are none.
pub fn mean(values: &[f64]) -> Option<f64> {
    let (sum, n) = finite(values).fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Standard deviation of the finite values with `ddof` delta degrees of
/// freedom. `None` when fewer than `ddof + 1` values are present.
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    let n = finite_count(values);
    if n <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = finite(values).map(|v| (v - m).powi(2)).sum();
    Some((ss / (n - ddof) as f64).sqrt())
}

/// Sorted copy of the finite values.
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = finite(values).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Quantile `q` in `[0, 1]` of an already sorted, finite slice using linear
/// interpolation between the closest ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !q.is_finite() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Quantile `q` in `[0, 1]` of the finite values.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted_finite(values), q)
}

/// Percentile `p` in `[0, 100]` of the finite values.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    quantile(values, p / 100.0)
}

/// Median of the finite values.
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Clamp every finite value into `[lo, hi]`; non-finite values pass through.
pub fn clip(values: &[f64], lo: f64, hi: f64) -> Vec<f64> {
    values
        .iter()
        .map(|&v| if v.is_finite() { v.clamp(lo, hi) } else { v })
        .collect()
}

/// Replace every non-finite value with `fill`.
pub fn fill_non_finite(values: &[f64], fill: f64) -> Vec<f64> {
    values
        .iter()
        .map(|&v| if v.is_finite() { v } else { fill })
        .collect()
}

/// First difference; the first element is NaN.
pub fn diff(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i == 0 {
            out.push(f64::NAN);
        } else {
            out.push(values[i] - values[i - 1]);
        }
    }
    out
}

/// Fractional change from the previous element. Zero denominators yield NaN
/// instead of Infinity; the first element is NaN.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i == 0 {
            out.push(f64::NAN);
            continue;
        }
        let change = values[i] / values[i - 1] - 1.0;
        out.push(if change.is_finite() { change } else { f64::NAN });
    }
    out
}

/// Shift values forward by `lag` positions, filling the vacated head with `fill`.
pub fn shift(values: &[f64], lag: usize, fill: f64) -> Vec<f64> {
    (0..values.len())
        .map(|i| if i < lag { fill } else { values[i - lag] })
        .collect()
}

/// Linear interpolation across interior gaps. Leading and trailing gaps stay
/// NaN; non-finite values count as gaps.
pub fn interpolate_linear(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values
        .iter()
        .map(|&v| if v.is_finite() { v } else { f64::NAN })
        .collect();
    let mut prev: Option<usize> = None;
    for i in 0..out.len() {
        if !out[i].is_finite() {
            continue;
        }
        if let Some(p) = prev {
            if i > p + 1 {
                let (a, b) = (out[p], out[i]);
                let span = (i - p) as f64;
                for j in p + 1..i {
                    out[j] = a + (b - a) * (j - p) as f64 / span;
                }
            }
        }
        prev = Some(i);
    }
    out
}

/// Propagate the last finite value forward over gaps.
pub fn forward_fill(values: &[f64]) -> Vec<f64> {
    let mut last = f64::NAN;
    values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                last = v;
                v
            } else {
                last
            }
        })
        .collect()
}

/// Propagate the next finite value backward over gaps.
pub fn backward_fill(values: &[f64]) -> Vec<f64> {
    let mut out = forward_fill(&values.iter().rev().copied().collect::<Vec<_>>());
    out.reverse();
    out
}

/// Statistic computed over a trailing rolling window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RollingStat {
    Mean,
    /// Sample standard deviation (ddof = 1).
    Std,
    Min,
    Max,
    Median,
}

/// Trailing-window statistic ending at each position.
///
/// A window yields a value only when it holds at least `min_periods` finite
/// observations (and at least two for [`RollingStat::Std`]); otherwise NaN.
pub fn rolling(values: &[f64], window: usize, min_periods: usize, stat: RollingStat) -> Vec<f64> {
    let window = window.max(1);
    let min_periods = min_periods.max(1);
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let slice = &values[start..=i];
        if finite_count(slice) < min_periods {
            out.push(f64::NAN);
            continue;
        }
        let v = match stat {
            RollingStat::Mean => mean(slice),
            RollingStat::Std => std_dev(slice, 1),
            RollingStat::Min => finite(slice).reduce(f64::min),
            RollingStat::Max => finite(slice).reduce(f64::max),
            RollingStat::Median => median(slice),
        };
        out.push(v.unwrap_or(f64::NAN));
    }
    out
}

/// Population z-scores. A zero or undefined spread yields all zeros.
pub fn zscores(values: &[f64]) -> Vec<f64> {
    let (m, s) = match (mean(values), std_dev(values, 0)) {
        (Some(m), Some(s)) if s > 0.0 && s.is_finite() => (m, s),
        _ => return vec![0.0; values.len()],
    };
    values
        .iter()
        .map(|&v| if v.is_finite() { (v - m) / s } else { 0.0 })
        .collect()
}

/// Rescale finite values into `[0, 1]`. A constant series maps to zeros.
pub fn min_max_scale(values: &[f64]) -> Vec<f64> {
    let lo = finite(values).reduce(f64::min);
    let hi = finite(values).reduce(f64::max);
    match (lo, hi) {
        (Some(lo), Some(hi)) if hi > lo => values
            .iter()
            .map(|&v| if v.is_finite() { (v - lo) / (hi - lo) } else { v })
            .collect(),
        _ => values
            .iter()
            .map(|&v| if v.is_finite() { 0.0 } else { v })
            .collect(),
    }
}

/// Linearly rescale finite values into `[0, 1]`; used to normalize fallback
/// scores. Identical to [`min_max_scale`] but always finite.
pub fn normalize_unit(values: &[f64]) -> Vec<f64> {
    fill_non_finite(&min_max_scale(values), 0.0)
}
