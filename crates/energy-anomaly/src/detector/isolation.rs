//! Isolation-forest detector with per-feature attribution.

use tracing::{debug, warn};

use crate::error::{AnomalyError, AnomalyResult};
use crate::features::{rolling_feature, FeatureMatrix};
use crate::metrics::{FeatureAnomalyDetail, FeatureImportance, Metrics};
use crate::models::{FittedForest, IsolationForest};
use crate::result::DetectionResult;
use crate::stats::{self, RollingStat};
use crate::table::{feature_columns, TimeSeriesTable};

use super::pipeline::{self, zscore_sum, FeaturePipeline, PreparedInput, Scored};
use super::types::IsolationConfig;
use super::{Algorithm, AnomalyDetector};

/// Percentile of each feature above which that feature alone flags a row.
pub const FEATURE_FLAG_PERCENTILE: f64 = 95.0;

/// Rolling window for isolation features: `min(24, rows / 10)` for more than
/// 30 rows, otherwise 3.
pub fn isolation_window(rows: usize) -> usize {
    if rows > 30 {
        (rows / 10).clamp(1, 24)
    } else {
        3
    }
}

/// Isolation-forest detector. Works on one value column, or on every
/// eligible numeric column when no value column is named.
#[derive(Clone, Debug, Default)]
pub struct IsolationDetector {
    config: IsolationConfig,
}

impl IsolationDetector {
    pub fn new(config: IsolationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IsolationConfig {
        &self.config
    }

    fn forest(&self) -> IsolationForest {
        IsolationForest {
            n_estimators: self.config.n_estimators,
            max_samples: self.config.max_samples,
            contamination: self.config.contamination,
            seed: self.config.random_seed,
        }
    }
}

impl FeaturePipeline for IsolationDetector {
    type Model = FittedForest;

    fn algorithm(&self) -> Algorithm {
        Algorithm::IsolationForest
    }

    fn validate(&self) -> AnomalyResult<()> {
        self.config.validate()
    }

    fn select_columns(
        &self,
        table: &TimeSeriesTable,
        time_column: Option<&str>,
        value_column: Option<&str>,
    ) -> AnomalyResult<Vec<String>> {
        match value_column {
            Some(v) if table.has_column(v) => return Ok(vec![v.to_string()]),
            Some(v) => warn!(hint = v, "value column not found; selecting all numeric features"),
            None => {}
        }

        let mut columns = feature_columns(table);
        if let Some(t) = time_column {
            columns.retain(|c| c != t);
        }
        columns.retain(|c| {
            let usable = table.column(c).is_some_and(|col| col.has_finite());
            if !usable {
                debug!(column = %c, "skipping feature without finite values");
            }
            usable
        });
        if columns.is_empty() {
            return Err(AnomalyError::NoFeatures(format!(
                "no numeric column outside the excluded names (columns: {:?})",
                table.column_names()
            )));
        }
        debug!(features = ?columns, "auto-selected isolation features");
        Ok(columns)
    }

    fn build_features(&self, input: &PreparedInput) -> AnomalyResult<FeatureMatrix> {
        let window = isolation_window(input.rows());
        let mut columns = Vec::with_capacity(input.series.len() * 7);
        for s in &input.series {
            let v = &s.values;
            columns.push((s.name.clone(), v.clone()));
            for (suffix, stat) in [
                ("rolling_mean", RollingStat::Mean),
                ("rolling_std", RollingStat::Std),
                ("rolling_max", RollingStat::Max),
                ("rolling_min", RollingStat::Min),
            ] {
                columns.push((format!("{}_{suffix}", s.name), rolling_feature(v, window, stat)));
            }
            columns.push((format!("{}_diff", s.name), stats::fill_non_finite(&stats::diff(v), 0.0)));
            columns.push((
                format!("{}_pct_change", s.name),
                stats::fill_non_finite(&stats::pct_change(v), 0.0),
            ));
        }
        Ok(FeatureMatrix::from_columns(columns)?.standardize())
    }

    fn fit(&self, features: &FeatureMatrix) -> AnomalyResult<FittedForest> {
        self.forest().fit(features.data())
    }

    fn score(&self, model: &FittedForest, features: &FeatureMatrix) -> AnomalyResult<Scored> {
        let decision = model.decision_function(features.data());
        Ok(Scored {
            labels: decision.iter().map(|&d| u8::from(d < 0.0)).collect(),
            scores: decision.into_iter().map(|d| -d).collect(),
            ..Default::default()
        })
    }

    /// z-score sum over the cleaned columns, cut at the `1 - contamination` quantile.
    fn fallback(&self, input: &PreparedInput) -> AnomalyResult<Scored> {
        let scores = zscore_sum(input);
        let threshold = stats::quantile(&scores, 1.0 - self.config.contamination)
            .ok_or_else(|| AnomalyError::computation("isolation-fallback", "no scores"))?;
        let mut scored = Scored::thresholded(scores, threshold);
        // The forest reports no threshold; keep the fallback consistent.
        scored.threshold = None;
        Ok(scored)
    }

    fn annotate(
        &self,
        input: &PreparedInput,
        result: &mut DetectionResult,
        metrics: &mut Metrics,
    ) -> AnomalyResult<()> {
        let flagged = &result.is_anomaly;
        let mut importance = Vec::with_capacity(input.series.len());
        for s in &input.series {
            let threshold = stats::percentile(&s.values, FEATURE_FLAG_PERCENTILE).ok_or_else(|| {
                AnomalyError::computation("feature-attribution", format!("'{}' is empty", s.name))
            })?;
            let flags: Vec<u8> = s.values.iter().map(|&v| u8::from(v > threshold)).collect();

            let (at_anomalies, at_normal): (Vec<f64>, Vec<f64>) = {
                let mut a = Vec::new();
                let mut n = Vec::new();
                for (&v, &f) in s.values.iter().zip(flagged) {
                    if f == 1 {
                        a.push(v);
                    } else {
                        n.push(v);
                    }
                }
                (a, n)
            };
            let mean_at_anomalies = stats::mean(&at_anomalies).unwrap_or(0.0);
            let mean_at_normal = stats::mean(&at_normal).unwrap_or(0.0);
            let score = if at_anomalies.is_empty() || at_normal.is_empty() {
                0.0
            } else {
                (mean_at_anomalies - mean_at_normal).abs()
            };

            metrics.anomaly_details.insert(
                s.name.clone(),
                FeatureAnomalyDetail {
                    mean_at_anomalies,
                    std_at_anomalies: stats::std_dev(&at_anomalies, 0).unwrap_or(0.0),
                    max_at_anomalies: stats::finite(&at_anomalies).reduce(f64::max).unwrap_or(0.0),
                    mean_at_normal,
                    count: flags.iter().filter(|&&f| f == 1).count(),
                    threshold,
                },
            );
            importance.push(FeatureImportance {
                feature: s.name.clone(),
                importance: score,
            });
            result.feature_flags.push((s.name.clone(), flags));
        }
        importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        metrics.feature_importance = importance;
        Ok(())
    }
}

impl AnomalyDetector for IsolationDetector {
    fn algorithm(&self) -> Algorithm {
        Algorithm::IsolationForest
    }

    fn detect_anomalies(
        &self,
        table: &TimeSeriesTable,
        time_column: Option<&str>,
        value_column: Option<&str>,
    ) -> AnomalyResult<(DetectionResult, Metrics)> {
        pipeline::run(self, table, time_column, value_column)
    }
}
