//! Reconstruction-error detector (PCA).

use crate::error::{AnomalyError, AnomalyResult};
use crate::fallback::FallbackChain;
use crate::features::{rolling_feature, FeatureMatrix};
use crate::metrics::Metrics;
use crate::models::{FittedPca, Pca};
use crate::result::DetectionResult;
use crate::stats::{self, RollingStat};
use crate::table::TimeSeriesTable;

use super::pipeline::{self, zscore_sum, FeaturePipeline, PreparedInput, Scored};
use super::types::ReconstructionConfig;
use super::{Algorithm, AnomalyDetector, RECONSTRUCTION_WINDOWS};

/// Scores rows by how badly a low-rank linear projection reconstructs
/// their scaled value and its rolling statistics.
#[derive(Clone, Debug, Default)]
pub struct ReconstructionDetector {
    config: ReconstructionConfig,
}

impl ReconstructionDetector {
    pub fn new(config: ReconstructionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// Configured percentile of `scores`, or `mean + 2·std` when that is undefined.
    fn threshold(&self, scores: &[f64]) -> AnomalyResult<f64> {
        let p = self.config.threshold_percentile;
        let resolved = FallbackChain::new("threshold")
            .attempt("percentile", || {
                stats::percentile(scores, p)
                    .filter(|t| t.is_finite())
                    .ok_or_else(|| AnomalyError::computation("threshold", "percentile undefined"))
            })
            .attempt("mean-plus-2std", || {
                match (stats::mean(scores), stats::std_dev(scores, 0)) {
                    (Some(m), Some(s)) => Ok(m + 2.0 * s),
                    _ => Err(AnomalyError::computation("threshold", "no finite scores")),
                }
            })
            .run()?;
        Ok(resolved.value)
    }
}

impl FeaturePipeline for ReconstructionDetector {
    type Model = FittedPca;

    fn algorithm(&self) -> Algorithm {
        Algorithm::Autoencoder
    }

    fn validate(&self) -> AnomalyResult<()> {
        self.config.validate()
    }

    /// Min-max scaled value plus rolling mean/std at 3, 6, 12, and 24 rows.
    fn build_features(&self, input: &PreparedInput) -> AnomalyResult<FeatureMatrix> {
        let scaled = stats::min_max_scale(&input.primary().values);
        let mut columns = vec![("value_scaled".to_string(), scaled.clone())];
        for w in RECONSTRUCTION_WINDOWS {
            columns.push((format!("rolling_mean_{w}"), rolling_feature(&scaled, w, RollingStat::Mean)));
            columns.push((format!("rolling_std_{w}"), rolling_feature(&scaled, w, RollingStat::Std)));
        }
        FeatureMatrix::from_columns(columns)
    }

    fn fit(&self, features: &FeatureMatrix) -> AnomalyResult<FittedPca> {
        Pca {
            n_components: self.config.n_components,
        }
        .fit(features.data())
    }

    fn score(&self, model: &FittedPca, features: &FeatureMatrix) -> AnomalyResult<Scored> {
        let errors = model.reconstruction_error(features.data());
        let threshold = self.threshold(&errors)?;
        let mut scored = Scored::thresholded(errors, threshold);
        scored.n_components = Some(model.n_components());
        Ok(scored)
    }

    /// z-score sum of the cleaned value, normalized to `[0, 1]`.
    fn fallback(&self, input: &PreparedInput) -> AnomalyResult<Scored> {
        let scores = stats::normalize_unit(&zscore_sum(input));
        let threshold = self.threshold(&scores)?;
        Ok(Scored::thresholded(scores, threshold))
    }
}

impl AnomalyDetector for ReconstructionDetector {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Autoencoder
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
