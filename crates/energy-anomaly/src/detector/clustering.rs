//! Centroid-distance detector (k-means).

use ndarray::Array2;
use tracing::debug;

use crate::error::{AnomalyError, AnomalyResult};
use crate::features::{rolling_feature, FeatureMatrix};
use crate::metrics::Metrics;
use crate::models::{squared_distance, FittedKMeans, KMeans};
use crate::result::DetectionResult;
use crate::stats::{self, RollingStat};
use crate::table::TimeSeriesTable;

use super::pipeline::{self, zscore_sum, FeaturePipeline, PreparedInput, Scored};
use super::types::ClusteringConfig;
use super::{Algorithm, AnomalyDetector};

/// Percentile of distances used when per-cluster averages give no threshold,
/// and by the z-score fallback.
pub const DISTANCE_FALLBACK_PERCENTILE: f64 = 95.0;

/// Clusters this small (relative to row count) do not get their own center.
pub const MICRO_CLUSTER_FRACTION: f64 = 0.01;

/// Cluster count actually fitted: `max(2, min(requested, rows - 1))`.
pub fn effective_clusters(requested: usize, rows: usize) -> usize {
    requested.min(rows.saturating_sub(1)).max(2)
}

/// Largest cluster size that still counts as a micro-cluster.
pub fn micro_cluster_size(rows: usize) -> usize {
    ((rows as f64 * MICRO_CLUSTER_FRACTION).ceil() as usize).max(2)
}

/// Scores each row by its Euclidean distance to the nearest cluster center
/// over standardized value, rolling, and rate-of-change features.
#[derive(Clone, Debug, Default)]
pub struct ClusteringDetector {
    config: ClusteringConfig,
}

impl ClusteringDetector {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }
}

/// Assign every row to a center and measure its distance.
///
/// Rows of micro-clusters are re-homed to the nearest regular center when
/// at least one regular cluster exists. Returns the assignments, distances,
/// and the indices of the regular clusters.
fn assign(fitted: &FittedKMeans, data: &Array2<f64>) -> (Vec<usize>, Vec<f64>, Vec<usize>) {
    let k = fitted.centers.nrows();
    let mut sizes = vec![0usize; k];
    for &l in &fitted.labels {
        sizes[l] += 1;
    }
    let micro_max = micro_cluster_size(data.nrows());
    let regular: Vec<usize> = (0..k).filter(|&c| sizes[c] > micro_max).collect();
    let rehome = !regular.is_empty() && regular.len() < k;

    let mut assignment = fitted.labels.clone();
    let mut distances = Vec::with_capacity(data.nrows());
    for (i, x) in data.rows().into_iter().enumerate() {
        let own = fitted.labels[i];
        if rehome && sizes[own] <= micro_max {
            let (best, d2) = regular
                .iter()
                .map(|&c| (c, squared_distance(x, fitted.centers.row(c))))
                .fold((own, f64::INFINITY), |b, (c, d)| if d < b.1 { (c, d) } else { b });
            assignment[i] = best;
            distances.push(d2.sqrt());
        } else {
            distances.push(squared_distance(x, fitted.centers.row(own)).sqrt());
        }
    }
    if rehome {
        debug!(
            micro_clusters = k - regular.len(),
            "re-homed micro-cluster rows to regular centers"
        );
    }
    let regular = if rehome { regular } else { (0..k).collect() };
    (assignment, distances, regular)
}

impl FeaturePipeline for ClusteringDetector {
    type Model = FittedKMeans;

    fn algorithm(&self) -> Algorithm {
        Algorithm::KMeans
    }

    fn validate(&self) -> AnomalyResult<()> {
        self.config.validate()
    }

    /// Value, rolling mean/median/max/min/std, and first difference.
    fn build_features(&self, input: &PreparedInput) -> AnomalyResult<FeatureMatrix> {
        let v = &input.primary().values;
        let w = self.config.window_size;
        let mut columns = vec![("value".to_string(), v.clone())];
        for (name, stat) in [
            ("rolling_mean", RollingStat::Mean),
            ("rolling_median", RollingStat::Median),
            ("rolling_max", RollingStat::Max),
            ("rolling_min", RollingStat::Min),
            ("rolling_std", RollingStat::Std),
        ] {
            columns.push((name.to_string(), rolling_feature(v, w, stat)));
        }
        columns.push((
            "rate_of_change".to_string(),
            stats::fill_non_finite(&stats::diff(v), 0.0),
        ));
        Ok(FeatureMatrix::from_columns(columns)?.standardize())
    }

    fn fit(&self, features: &FeatureMatrix) -> AnomalyResult<FittedKMeans> {
        let rows = features.nrows();
        let k = effective_clusters(self.config.n_clusters, rows);
        debug!(requested = self.config.n_clusters, effective = k, rows, "fitting kmeans");
        KMeans {
            k,
            n_init: self.config.n_init,
            max_iter: self.config.max_iter,
            seed: self.config.random_seed,
        }
        .fit(features.data())
    }

    /// Threshold = `threshold_factor ×` the largest mean distance of a regular
    /// cluster, or the 95th percentile of distances when that is zero.
    fn score(&self, model: &FittedKMeans, features: &FeatureMatrix) -> AnomalyResult<Scored> {
        let (assignment, distances, regular) = assign(model, features.data());

        let max_avg = regular
            .iter()
            .filter_map(|&c| {
                let members: Vec<f64> = model
                    .labels
                    .iter()
                    .zip(&distances)
                    .filter(|(&l, _)| l == c)
                    .map(|(_, &d)| d)
                    .collect();
                stats::mean(&members)
            })
            .fold(0.0, f64::max);

        let threshold = if max_avg > 0.0 {
            self.config.threshold_factor * max_avg
        } else {
            stats::percentile(&distances, DISTANCE_FALLBACK_PERCENTILE).ok_or_else(|| {
                AnomalyError::computation("cluster-threshold", "no finite distances")
            })?
        };

        let mut scored = Scored::thresholded(distances, threshold);
        scored.clusters = Some(assignment);
        scored.n_clusters = Some(model.centers.nrows());
        Ok(scored)
    }

    /// Normalized z-score sum, 95th-percentile cut, everything in cluster 0.
    fn fallback(&self, input: &PreparedInput) -> AnomalyResult<Scored> {
        let scores = stats::normalize_unit(&zscore_sum(input));
        let threshold = stats::percentile(&scores, DISTANCE_FALLBACK_PERCENTILE)
            .ok_or_else(|| AnomalyError::computation("cluster-fallback", "no scores"))?;
        let rows = scores.len();
        let mut scored = Scored::thresholded(scores, threshold);
        scored.clusters = Some(vec![0; rows]);
        scored.n_clusters = Some(1);
        Ok(scored)
    }
}

impl AnomalyDetector for ClusteringDetector {
    fn algorithm(&self) -> Algorithm {
        Algorithm::KMeans
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn noise(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 40.0 + ((i * 7919) % 97) as f64 / 8.0 + 2.0 * (i as f64 * 0.45).cos())
            .collect()
    }

    fn table(values: &[f64]) -> TimeSeriesTable {
        TimeSeriesTable::from_columns(vec![Column::numeric("kwh", values)]).unwrap()
    }

    #[test]
    fn effective_cluster_rule() {
        assert_eq!(effective_clusters(5, 2), 2);
        assert_eq!(effective_clusters(5, 4), 3);
        assert_eq!(effective_clusters(5, 1000), 5);
        assert_eq!(effective_clusters(1, 100), 2);
        assert_eq!(micro_cluster_size(100), 2);
        assert_eq!(micro_cluster_size(1000), 10);
    }

    #[test]
    fn flags_spike_and_reports_clusters() {
        let mut values = noise(300);
        let mean = stats::mean(&values).unwrap();
        let std = stats::std_dev(&values, 0).unwrap();
        values[200] = mean + 50.0 * std;
        let (result, metrics) = ClusteringDetector::default()
            .detect_anomalies(&table(&values), None, None)
            .unwrap();

        assert_eq!(result.is_anomaly[200], 1);
        assert_eq!(metrics.clusters, Some(5));
        let clusters = result.cluster.as_ref().unwrap();
        assert_eq!(clusters.len(), 300);
        assert!(clusters.iter().all(|&c| c < 5));
        assert!(metrics.note.is_none());
    }

    #[test]
    fn stationary_series_flags_few_rows() {
        let (_, metrics) = ClusteringDetector::default()
            .detect_anomalies(&table(&noise(400)), None, None)
            .unwrap();
        assert!(metrics.anomaly_rate() <= 0.10, "rate = {}", metrics.anomaly_rate());
    }

    #[test]
    fn two_rows_fit_two_clusters() {
        let (result, metrics) = ClusteringDetector::default()
            .detect_anomalies(&table(&[1.0, 5.0]), None, None)
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(metrics.clusters, Some(2));
    }

    #[test]
    fn single_row_falls_back_to_one_cluster() {
        let (result, metrics) = ClusteringDetector::default()
            .detect_anomalies(&table(&[1.0]), None, None)
            .unwrap();
        assert_eq!(result.cluster, Some(vec![0]));
        assert_eq!(metrics.clusters, Some(1));
        assert!(metrics.note.is_some());
    }

    #[test]
    fn micro_cluster_rows_are_rehomed() {
        let labels = vec![0, 0, 0, 0, 1];
        let centers = Array2::from_shape_vec((2, 1), vec![0.0, 10.0]).unwrap();
        let fitted = FittedKMeans {
            centers,
            labels,
            inertia: 0.0,
            iterations: 1,
        };
        let data = Array2::from_shape_vec((5, 1), vec![0.0, 0.0, 0.0, 0.0, 10.0]).unwrap();
        let (assignment, distances, regular) = assign(&fitted, &data);
        assert_eq!(assignment, vec![0; 5]);
        assert_eq!(distances[4], 10.0);
        assert_eq!(regular, vec![0]);
    }
}
