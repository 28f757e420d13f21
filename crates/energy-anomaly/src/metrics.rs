//! Detection metrics and the synthetic self-evaluation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::detector::Algorithm;
use crate::stats;

/// Percentile of the raw values above which a row counts as a synthetic positive.
pub const SYNTHETIC_LABEL_PERCENTILE: f64 = 95.0;

// ── Run ID ──────────────────────────────────────────────────────────────

/// Identifier shared by the result and metrics of one detection run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new unique run ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run:{}", self.0)
    }
}

// ── Feature Attribution ─────────────────────────────────────────────────

/// How strongly one input feature separates anomalies from normal rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    /// `|mean at anomalies − mean at normal rows|`.
    pub importance: f64,
}

/// Summary of one feature at the rows the detector flagged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureAnomalyDetail {
    pub mean_at_anomalies: f64,
    pub std_at_anomalies: f64,
    pub max_at_anomalies: f64,
    pub mean_at_normal: f64,
    /// Rows above the feature's own 95th percentile.
    pub count: usize,
    /// The feature's own 95th percentile.
    pub threshold: f64,
}

// ── Synthetic Evaluation ────────────────────────────────────────────────

/// Precision/recall/F1 against "raw value above its 95th percentile".
///
/// There is no ground truth; these numbers compare the detector with a
/// crude heuristic and are diagnostic only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SyntheticEvaluation {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl SyntheticEvaluation {
    /// Score `predicted` against the synthetic label derived from `values`.
    /// Undefined ratios (zero denominators) are 0.
    pub fn against_high_values(values: &[f64], predicted: &[u8]) -> Self {
        let Some(cut) = stats::percentile(values, SYNTHETIC_LABEL_PERCENTILE) else {
            return Self::default();
        };
        let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
        for (&v, &p) in values.iter().zip(predicted) {
            let actual = v.is_finite() && v > cut;
            match (actual, p == 1) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1_score,
        }
    }
}

// ── Metrics ─────────────────────────────────────────────────────────────

/// Everything a detection run reports besides the annotated rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub run_id: RunId,
    pub algorithm: Algorithm,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub anomaly_count: usize,
    pub total_points: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusters: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_components: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_importance: Vec<FeatureImportance>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub anomaly_details: BTreeMap<String, FeatureAnomalyDetail>,
    /// Set when any stage fell back to a simpler strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Metrics {
    pub fn new(run_id: RunId, algorithm: Algorithm, labels: &[u8]) -> Self {
        Self {
            run_id,
            algorithm,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            anomaly_count: labels.iter().filter(|&&l| l == 1).count(),
            total_points: labels.len(),
            threshold: None,
            clusters: None,
            n_components: None,
            feature_importance: Vec::new(),
            anomaly_details: BTreeMap::new(),
            note: None,
        }
    }

    pub fn with_evaluation(mut self, eval: SyntheticEvaluation) -> Self {
        self.precision = eval.precision;
        self.recall = eval.recall;
        self.f1_score = eval.f1_score;
        self
    }

    /// Append to the note, separating entries with `"; "`.
    pub fn add_note(&mut self, note: impl Into<String>) {
        let note = note.into();
        self.note = Some(match self.note.take() {
            Some(existing) => format!("{existing}; {note}"),
            None => note,
        });
    }

    /// Fraction of rows flagged.
    pub fn anomaly_rate(&self) -> f64 {
        if self.total_points == 0 {
            0.0
        } else {
            self.anomaly_count as f64 / self.total_points as f64
        }
    }
}
