//! Annotated detection output.

use crate::error::AnomalyResult;
use crate::metrics::RunId;
use crate::table::{Column, TimeSeriesTable, Value};

/// Column holding the 0/1 anomaly flag.
pub const IS_ANOMALY_COLUMN: &str = "is_anomaly";
/// Column holding the detector-specific anomaly score.
pub const ANOMALY_SCORE_COLUMN: &str = "anomaly_score";
/// Column holding the cluster assignment (clustering detector only).
pub const CLUSTER_COLUMN: &str = "cluster";

/// The caller's table plus per-row detector output, row-aligned.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    pub run_id: RunId,
    /// Copy of the input table; never mutated by detectors.
    pub table: TimeSeriesTable,
    pub is_anomaly: Vec<u8>,
    /// Higher = more anomalous. Scale depends on the detector.
    pub anomaly_score: Vec<f64>,
    pub cluster: Option<Vec<usize>>,
    /// `(feature, flags)` pairs emitted as `{feature}_anomaly` columns.
    pub feature_flags: Vec<(String, Vec<u8>)>,
}

impl DetectionResult {
    pub fn len(&self) -> usize {
        self.is_anomaly.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_anomaly.is_empty()
    }

    pub fn anomaly_count(&self) -> usize {
        self.is_anomaly.iter().filter(|&&f| f == 1).count()
    }

    /// Row indices flagged as anomalous, ascending.
    pub fn anomalous_rows(&self) -> Vec<usize> {
        self.is_anomaly
            .iter()
            .enumerate()
            .filter_map(|(i, &f)| (f == 1).then_some(i))
            .collect()
    }

    /// Row indices of the `k` highest scores, highest first. Ties keep row order.
    pub fn top_by_score(&self, k: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.anomaly_score.len()).collect();
        order.sort_by(|&a, &b| self.anomaly_score[b].total_cmp(&self.anomaly_score[a]));
        order.truncate(k);
        order
    }

    /// Flatten into the input table extended with `is_anomaly`,
    /// `anomaly_score`, `{feature}_anomaly`, and `cluster` columns.
    pub fn into_table(self) -> AnomalyResult<TimeSeriesTable> {
        let mut table = self.table;
        table.insert_column(flag_column(IS_ANOMALY_COLUMN, &self.is_anomaly))?;
        table.set_numeric(ANOMALY_SCORE_COLUMN, &self.anomaly_score)?;
        for (feature, flags) in &self.feature_flags {
            table.insert_column(flag_column(&format!("{feature}_anomaly"), flags))?;
        }
        if let Some(cluster) = &self.cluster {
            table.insert_column(Column::new(
                CLUSTER_COLUMN,
                cluster.iter().map(|&c| Value::Number(c as f64)).collect(),
            ))?;
        }
        Ok(table)
    }
}

fn flag_column(name: &str, flags: &[u8]) -> Column {
    Column::new(
        name,
        flags.iter().map(|&f| Value::Number(f64::from(f))).collect(),
    )
}
