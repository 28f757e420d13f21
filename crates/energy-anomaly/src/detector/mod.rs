//! The three anomaly detectors and their shared contract.
//!
//! ## Architecture
//!
//! ```text
//!   TimeSeriesTable ──► AnomalyDetector::detect_anomalies ──► (DetectionResult, Metrics)
//!                              │
//!                              │  pipeline::run (shared driver)
//!                              ├── select columns ─► SeriesCleaner   (fatal errors surface here)
//!                              ├── FallbackChain "score"
//!                              │     ├── model     build_features → fit → score
//!                              │     ├── fallback  detector-specific z-score scorer
//!                              │     └── raw-zscore  |z| of the raw value, 95th pct
//!                              └── annotate (feature attribution, clusters)
//!
//!   IsolationDetector       isolation forest, multi-column, feature importance
//!   ReconstructionDetector  PCA reconstruction error
//!   ClusteringDetector      k-means centroid distance
//! ```
//!
//! Detectors hold only configuration. Every fitted artifact lives for one
//! call, so a detector can be shared across threads.

pub mod clustering;
pub mod isolation;
pub mod pipeline;
pub mod reconstruction;
pub mod types;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnomalyError, AnomalyResult};
use crate::metrics::Metrics;
use crate::preprocess::Preprocessor;
use crate::result::DetectionResult;
use crate::table::TimeSeriesTable;

pub use clustering::ClusteringDetector;
pub use isolation::IsolationDetector;
pub use pipeline::{FeaturePipeline, PreparedInput, Scored};
pub use reconstruction::ReconstructionDetector;
pub use types::{ClusteringConfig, DetectionConfig, IsolationConfig, ReconstructionConfig};

/// Expected fraction of anomalous points for the isolation forest.
pub const DEFAULT_CONTAMINATION: f64 = 0.05;

/// Trees in the isolation forest.
pub const DEFAULT_N_ESTIMATORS: usize = 100;

/// Subsample size per isolation tree.
pub const DEFAULT_MAX_SAMPLES: usize = 256;

/// Reconstruction-error percentile above which a row is anomalous.
pub const DEFAULT_THRESHOLD_PERCENTILE: f64 = 95.0;

/// Principal components kept by the reconstruction detector.
pub const DEFAULT_N_COMPONENTS: usize = 3;

/// Rolling windows for the reconstruction detector's features.
pub const RECONSTRUCTION_WINDOWS: [usize; 4] = [3, 6, 12, 24];

/// Requested clusters for the clustering detector.
pub const DEFAULT_N_CLUSTERS: usize = 5;

/// Rolling window for the clustering detector's features.
pub const DEFAULT_WINDOW_SIZE: usize = 24;

/// Multiplier on the largest per-cluster mean distance.
pub const DEFAULT_THRESHOLD_FACTOR: f64 = 1.5;

/// k-means restarts.
pub const DEFAULT_N_INIT: usize = 10;

/// Lloyd iterations per k-means restart.
pub const DEFAULT_MAX_ITER: usize = 300;

/// Seed for every randomized model.
pub const DEFAULT_RANDOM_SEED: u64 = 42;

// ── Algorithm ───────────────────────────────────────────────────────────

/// Detector selector, using the wire names of the upload form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "isolation_forest")]
    IsolationForest,
    /// PCA reconstruction error.
    #[serde(rename = "autoencoder")]
    Autoencoder,
    #[serde(rename = "kmeans")]
    KMeans,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Self::IsolationForest, Self::Autoencoder, Self::KMeans];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IsolationForest => "isolation_forest",
            Self::Autoencoder => "autoencoder",
            Self::KMeans => "kmeans",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = AnomalyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "isolation_forest" | "isolation" => Ok(Self::IsolationForest),
            "autoencoder" | "reconstruction" | "pca" => Ok(Self::Autoencoder),
            "kmeans" | "k_means" | "clustering" => Ok(Self::KMeans),
            other => Err(AnomalyError::Configuration(format!(
                "unknown algorithm '{other}' (expected one of isolation_forest, autoencoder, kmeans)"
            ))),
        }
    }
}

// ── Trait ───────────────────────────────────────────────────────────────

/// Common contract of every detector.
pub trait AnomalyDetector: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    /// Score every row of `table`.
    ///
    /// Column hints are optional; missing or absent hints fall back to
    /// name-based detection. Only configuration problems and the absence of
    /// usable numeric data are returned as errors. Numeric failures degrade
    /// to simpler scorers and are reported in `Metrics::note`.
    fn detect_anomalies(
        &self,
        table: &TimeSeriesTable,
        time_column: Option<&str>,
        value_column: Option<&str>,
    ) -> AnomalyResult<(DetectionResult, Metrics)>;
}

/// One detection request end to end: optional preprocessing, then the chosen
/// detector. Hints are forwarded only when both name columns of the
/// (possibly preprocessed) table; otherwise the detector auto-detects.
pub fn run_detection(
    table: &TimeSeriesTable,
    algorithm: Algorithm,
    time_column: Option<&str>,
    value_column: Option<&str>,
    config: &DetectionConfig,
) -> AnomalyResult<(DetectionResult, Metrics)> {
    config.validate()?;
    let working = if config.preprocess {
        Preprocessor::new(config.preprocessing.clone()).preprocess(table, time_column, value_column)?
    } else {
        table.clone()
    };

    let detector = config.detector(algorithm);
    match time_column.zip(value_column) {
        Some((t, v)) if working.has_column(t) && working.has_column(v) => {
            detector.detect_anomalies(&working, Some(t), Some(v))
        }
        _ => {
            debug!(algorithm = %algorithm, "column hints incomplete; detector will auto-detect");
            detector.detect_anomalies(&working, None, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_names_round_trip() {
        for a in Algorithm::ALL {
            assert_eq!(a.to_string().parse::<Algorithm>().unwrap(), a);
            let json = serde_json::to_string(&a).unwrap();
            assert_eq!(json, format!("\"{}\"", a.as_str()));
            assert_eq!(serde_json::from_str::<Algorithm>(&json).unwrap(), a);
        }
    }

    #[test]
    fn algorithm_aliases() {
        assert_eq!("K-Means".parse::<Algorithm>().unwrap(), Algorithm::KMeans);
        assert_eq!("pca".parse::<Algorithm>().unwrap(), Algorithm::Autoencoder);
        assert!(matches!(
            "svm".parse::<Algorithm>(),
            Err(AnomalyError::Configuration(_))
        ));
    }
}
