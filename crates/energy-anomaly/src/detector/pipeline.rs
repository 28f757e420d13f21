//! Shared detection driver.
//!
//! Detectors implement [`FeaturePipeline`]; [`run`] owns everything they
//! have in common: column selection, series cleaning, the scoring fallback
//! chain, synthetic evaluation, and result assembly.

use tracing::{info, warn};

use crate::error::{AnomalyError, AnomalyResult};
use crate::fallback::FallbackChain;
use crate::features::{CleanSeries, FeatureMatrix, SeriesCleaner};
use crate::metrics::{Metrics, RunId, SyntheticEvaluation};
use crate::result::DetectionResult;
use crate::stats;
use crate::table::{detect_time_column, resolve_value_column, TimeSeriesTable};

use super::Algorithm;

/// Percentile used by the last-resort raw z-score flag.
pub const SAFETY_NET_PERCENTILE: f64 = 95.0;

/// Cleaned inputs for one call.
#[derive(Clone, Debug)]
pub struct PreparedInput {
    /// Column used for the synthetic evaluation and the safety net.
    pub target: String,
    /// Raw values of `target`, uncleaned.
    pub raw: Vec<f64>,
    /// Every selected column after imputation and clipping.
    pub series: Vec<CleanSeries>,
}

impl PreparedInput {
    pub fn rows(&self) -> usize {
        self.raw.len()
    }

    /// The first selected series; single-column detectors work on it.
    pub fn primary(&self) -> &CleanSeries {
        &self.series[0]
    }

    /// Cleaned series as a plain matrix (no derived features).
    pub fn series_matrix(&self) -> AnomalyResult<FeatureMatrix> {
        FeatureMatrix::from_columns(
            self.series
                .iter()
                .map(|s| (s.name.clone(), s.values.clone()))
                .collect(),
        )
    }
}

/// Per-row scores and labels plus the fit parameters worth reporting.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scored {
    pub scores: Vec<f64>,
    pub labels: Vec<u8>,
    pub threshold: Option<f64>,
    pub clusters: Option<Vec<usize>>,
    pub n_clusters: Option<usize>,
    pub n_components: Option<usize>,
}

impl Scored {
    /// Label every score strictly above `threshold`.
    pub fn thresholded(scores: Vec<f64>, threshold: f64) -> Self {
        let labels = scores.iter().map(|&s| u8::from(s > threshold)).collect();
        Self {
            scores,
            labels,
            threshold: Some(threshold),
            ..Default::default()
        }
    }

    fn check_alignment(self, rows: usize) -> AnomalyResult<Self> {
        let clusters_ok = self.clusters.as_ref().map_or(true, |c| c.len() == rows);
        if self.scores.len() != rows || self.labels.len() != rows || !clusters_ok {
            return Err(AnomalyError::computation(
                "score",
                format!("scorer produced {} scores for {rows} rows", self.scores.len()),
            ));
        }
        if self.scores.iter().any(|s| !s.is_finite()) {
            return Err(AnomalyError::computation("score", "non-finite anomaly score"));
        }
        Ok(self)
    }
}

/// Per-row sum of absolute z-scores of the cleaned series.
pub fn zscore_sum(input: &PreparedInput) -> Vec<f64> {
    let mut total = vec![0.0; input.rows()];
    for series in &input.series {
        for (t, z) in total.iter_mut().zip(stats::zscores(&series.values)) {
            *t += z.abs();
        }
    }
    total
}

/// `|z|` of the raw target values, flagged above their 95th percentile.
pub fn raw_zscore(raw: &[f64]) -> Scored {
    let scores: Vec<f64> = stats::zscores(raw).into_iter().map(f64::abs).collect();
    let threshold = stats::percentile(&scores, SAFETY_NET_PERCENTILE).unwrap_or(0.0);
    Scored::thresholded(scores, threshold)
}

/// The stages a detector plugs into [`run`].
pub trait FeaturePipeline {
    /// Fitted model state; lives for one call.
    type Model;

    fn algorithm(&self) -> Algorithm;

    fn validate(&self) -> AnomalyResult<()>;

    /// Columns to clean and score. The default resolves a single value column.
    fn select_columns(
        &self,
        table: &TimeSeriesTable,
        time_column: Option<&str>,
        value_column: Option<&str>,
    ) -> AnomalyResult<Vec<String>> {
        let skip = time_column
            .filter(|t| table.has_column(t))
            .map(str::to_string)
            .or_else(|| detect_time_column(table));
        let column = resolve_value_column(table, value_column, skip.as_deref())?;
        Ok(vec![column])
    }

    fn build_features(&self, input: &PreparedInput) -> AnomalyResult<FeatureMatrix>;

    fn fit(&self, features: &FeatureMatrix) -> AnomalyResult<Self::Model>;

    fn score(&self, model: &Self::Model, features: &FeatureMatrix) -> AnomalyResult<Scored>;

    /// Simpler scorer used when build/fit/score fails. Must not depend on
    /// anything the failed path computed.
    fn fallback(&self, input: &PreparedInput) -> AnomalyResult<Scored>;

    /// Add detector-specific output (feature flags, attribution).
    fn annotate(
        &self,
        _input: &PreparedInput,
        _result: &mut DetectionResult,
        _metrics: &mut Metrics,
    ) -> AnomalyResult<()> {
        Ok(())
    }
}

fn prepare<P: FeaturePipeline + ?Sized>(
    pipeline: &P,
    table: &TimeSeriesTable,
    time_column: Option<&str>,
    value_column: Option<&str>,
) -> AnomalyResult<PreparedInput> {
    let columns = pipeline.select_columns(table, time_column, value_column)?;
    let Some(target) = columns.first().cloned() else {
        return Err(AnomalyError::NoFeatures("no candidate columns".into()));
    };

    let cleaner = SeriesCleaner::default();
    let series = columns
        .iter()
        .map(|name| {
            let raw = table.numeric(name).ok_or_else(|| {
                AnomalyError::Configuration(format!("column '{name}' not found"))
            })?;
            cleaner.clean(name, &raw)
        })
        .collect::<AnomalyResult<Vec<_>>>()?;

    let raw = table.numeric(&target).unwrap_or_default();
    Ok(PreparedInput {
        target,
        raw,
        series,
    })
}

/// Run `pipeline` over `table`: the shared `Input → Cleaned → Featurized →
/// Scored → Thresholded → Result` flow.
pub fn run<P: FeaturePipeline + ?Sized>(
    pipeline: &P,
    table: &TimeSeriesTable,
    time_column: Option<&str>,
    value_column: Option<&str>,
) -> AnomalyResult<(DetectionResult, Metrics)> {
    pipeline.validate()?;
    let input = prepare(pipeline, table, time_column, value_column)?;
    let rows = input.rows();

    let resolved = FallbackChain::new("score")
        .attempt("model", || {
            let features = pipeline.build_features(&input)?;
            let model = pipeline.fit(&features)?;
            pipeline.score(&model, &features)?.check_alignment(rows)
        })
        .attempt("fallback", || pipeline.fallback(&input)?.check_alignment(rows))
        .attempt("raw-zscore", || Ok(raw_zscore(&input.raw)))
        .run()?;
    let note = resolved.note("score");
    let degraded = resolved.degraded;
    let scored = resolved.value;

    let run_id = RunId::new();
    let mut result = DetectionResult {
        run_id: run_id.clone(),
        table: table.clone(),
        is_anomaly: scored.labels,
        anomaly_score: scored.scores,
        cluster: scored.clusters,
        feature_flags: Vec::new(),
    };
    let mut metrics = Metrics::new(run_id, pipeline.algorithm(), &result.is_anomaly)
        .with_evaluation(SyntheticEvaluation::against_high_values(
            &input.raw,
            &result.is_anomaly,
        ));
    metrics.threshold = scored.threshold;
    metrics.clusters = scored.n_clusters;
    metrics.n_components = scored.n_components;
    if let Some(note) = note {
        metrics.add_note(note);
    }

    if let Err(e) = pipeline.annotate(&input, &mut result, &mut metrics) {
        if e.is_fatal() {
            return Err(e);
        }
        warn!(stage = "annotate", error = %e, "feature attribution skipped");
        metrics.add_note(format!("annotate: skipped ({e})"));
    }
    metrics.anomaly_count = result.anomaly_count();
    metrics.total_points = result.len();

    info!(
        algorithm = %pipeline.algorithm(),
        rows,
        anomalies = metrics.anomaly_count,
        degraded,
        "detection complete"
    );
    Ok((result, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    /// Minimal pipeline whose model stage can be made to fail.
    struct Stub {
        fail_model: bool,
        fail_fallback: bool,
    }

    impl FeaturePipeline for Stub {
        type Model = ();

        fn algorithm(&self) -> Algorithm {
            Algorithm::Autoencoder
        }

        fn validate(&self) -> AnomalyResult<()> {
            Ok(())
        }

        fn build_features(&self, input: &PreparedInput) -> AnomalyResult<FeatureMatrix> {
            if self.fail_model {
                return Err(AnomalyError::computation("stub", "forced"));
            }
            input.series_matrix()
        }

        fn fit(&self, _features: &FeatureMatrix) -> AnomalyResult<()> {
            Ok(())
        }

        fn score(&self, _model: &(), features: &FeatureMatrix) -> AnomalyResult<Scored> {
            let scores = features.column("usage").unwrap().to_vec();
            Ok(Scored::thresholded(scores, 5.0))
        }

        fn fallback(&self, input: &PreparedInput) -> AnomalyResult<Scored> {
            if self.fail_fallback {
                return Err(AnomalyError::computation("stub", "forced"));
            }
            Ok(Scored::thresholded(zscore_sum(input), 1.0))
        }
    }

    fn table() -> TimeSeriesTable {
        TimeSeriesTable::from_columns(vec![
            Column::numeric("timestamp", &[0.0, 1.0, 2.0, 3.0]),
            Column::numeric("usage", &[1.0, 2.0, 9.0, 1.0]),
        ])
        .unwrap()
    }

    #[test]
    fn primary_path_has_no_note() {
        let stub = Stub {
            fail_model: false,
            fail_fallback: false,
        };
        let (result, metrics) = run(&stub, &table(), None, None).unwrap();
        assert_eq!(result.is_anomaly, vec![0, 0, 1, 0]);
        assert_eq!(metrics.anomaly_count, 1);
        assert_eq!(metrics.threshold, Some(5.0));
        assert!(metrics.note.is_none());
        assert_eq!(result.run_id, metrics.run_id);
    }

    #[test]
    fn model_failure_uses_fallback_and_notes_it() {
        let stub = Stub {
            fail_model: true,
            fail_fallback: false,
        };
        let (result, metrics) = run(&stub, &table(), None, None).unwrap();
        assert_eq!(result.len(), 4);
        assert!(metrics.note.unwrap().contains("fallback"));
    }

    #[test]
    fn safety_net_always_answers() {
        let stub = Stub {
            fail_model: true,
            fail_fallback: true,
        };
        let (result, metrics) = run(&stub, &table(), None, None).unwrap();
        assert_eq!(result.anomalous_rows(), vec![2]);
        assert!(metrics.note.unwrap().contains("raw-zscore"));
    }

    #[test]
    fn missing_numeric_data_is_fatal() {
        let stub = Stub {
            fail_model: false,
            fail_fallback: false,
        };
        let t = TimeSeriesTable::from_columns(vec![Column::numeric("usage", &[f64::NAN; 3])]).unwrap();
        assert!(matches!(
            run(&stub, &t, None, Some("usage")),
            Err(AnomalyError::NoFeatures(_))
        ));
    }

    #[test]
    fn raw_zscore_flags_the_extreme() {
        let s = raw_zscore(&[1.0, 1.0, 1.0, 1.0, 50.0]);
        assert_eq!(s.labels, vec![0, 0, 0, 0, 1]);
    }
}
