//! Series cleaning shared by every detector.

use tracing::debug;

use crate::error::{AnomalyError, AnomalyResult};
use crate::stats::{self, RollingStat};

/// A numeric column after imputation and clipping. Always finite.
#[derive(Clone, Debug, PartialEq)]
pub struct CleanSeries {
    pub name: String,
    pub values: Vec<f64>,
    /// Cells replaced by the median.
    pub imputed: usize,
    /// Cells moved to the clip bounds.
    pub clipped: usize,
}

impl CleanSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Median imputation followed by `mean ± clip_sigma · std` clipping.
#[derive(Clone, Copy, Debug)]
pub struct SeriesCleaner {
    pub clip_sigma: f64,
}

impl Default for SeriesCleaner {
    fn default() -> Self {
        Self {
            clip_sigma: super::DEFAULT_CLIP_SIGMA,
        }
    }
}

impl SeriesCleaner {
    pub fn new(clip_sigma: f64) -> Self {
        Self { clip_sigma }
    }

    /// Clean one column. A column with no finite value cannot be cleaned
    /// and yields [`AnomalyError::NoFeatures`].
    pub fn clean(&self, name: &str, raw: &[f64]) -> AnomalyResult<CleanSeries> {
        let median = stats::median(raw).ok_or_else(|| {
            AnomalyError::NoFeatures(format!("column '{name}' has no finite values"))
        })?;
        let imputed = raw.len() - stats::finite_count(raw);
        let filled = stats::fill_non_finite(raw, median);

        let (values, clipped) = match (stats::mean(&filled), stats::std_dev(&filled, 1)) {
            (Some(mean), Some(std)) if std > 0.0 && std.is_finite() => {
                let half = self.clip_sigma * std;
                let clipped_values = stats::clip(&filled, mean - half, mean + half);
                let clipped = clipped_values
                    .iter()
                    .zip(&filled)
                    .filter(|(a, b)| a != b)
                    .count();
                (clipped_values, clipped)
            }
            _ => (filled, 0),
        };

        if imputed > 0 || clipped > 0 {
            debug!(column = name, imputed, clipped, "cleaned series");
        }
        Ok(CleanSeries {
            name: name.to_string(),
            values,
            imputed,
            clipped,
        })
    }
}

/// Trailing-window statistic with partial windows. The undefined first
/// sample standard deviation becomes 0.
pub fn rolling_feature(values: &[f64], window: usize, stat: RollingStat) -> Vec<f64> {
    stats::fill_non_finite(&stats::rolling(values, window, 1, stat), 0.0)
}
