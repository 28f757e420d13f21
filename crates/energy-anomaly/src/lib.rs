//! # energy-anomaly
//!
//! Unsupervised anomaly detection for energy-consumption time series.
//!
//! A caller hands over a [`TimeSeriesTable`] and optional column-name hints,
//! picks one of three detectors, and gets back the table annotated with a
//! per-row anomaly flag and score plus a [`Metrics`] summary.
//!
//! ## Architecture
//!
//! ```text
//!   TimeSeriesTable ──► Preprocessor (optional)
//!                           │  timestamps, gap fill, sort, clip,
//!                           │  calendar / lag / rolling columns
//!                           ▼
//!                    ┌──────────────────┐
//!                    │  pipeline::run   │  column selection
//!                    │                  │  SeriesCleaner (impute + clip)
//!                    │  FallbackChain   │  model → fallback → raw z-score
//!                    └────────┬─────────┘
//!          ┌──────────────────┼───────────────────┐
//!          ▼                  ▼                   ▼
//!   IsolationDetector  ReconstructionDetector  ClusteringDetector
//!   isolation forest   PCA error               k-means distance
//!          └──────────────────┼───────────────────┘
//!                             ▼
//!                 (DetectionResult, Metrics)
//! ```
//!
//! ## Guarantees
//!
//! - Only [`AnomalyError::Configuration`] and [`AnomalyError::NoFeatures`]
//!   escape a call. Numeric trouble degrades to a simpler scorer and is
//!   reported in [`Metrics::note`].
//! - `Metrics::anomaly_count` always equals the number of flagged rows.
//! - Detectors hold configuration only; fits are seeded and call-scoped, so
//!   equal inputs give equal outputs and detectors can be shared across
//!   threads.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use energy_anomaly::{run_detection, sample, Algorithm, DetectionConfig};
//!
//! let series = sample::generate(&sample::SampleConfig::default()).unwrap();
//! let (result, metrics) = run_detection(
//!     &series.table,
//!     Algorithm::IsolationForest,
//!     Some("timestamp"),
//!     Some("energy_consumption"),
//!     &DetectionConfig::default(),
//! )
//! .unwrap();
//! assert_eq!(metrics.anomaly_count, result.anomaly_count());
//! ```

#![deny(unsafe_code)]

pub mod detector;
pub mod error;
pub mod fallback;
pub mod features;
pub mod metrics;
pub mod models;
pub mod preprocess;
pub mod result;
pub mod sample;
pub mod stats;
pub mod table;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use detector::{
    run_detection, Algorithm, AnomalyDetector, ClusteringConfig, ClusteringDetector,
    DetectionConfig, IsolationConfig, IsolationDetector, ReconstructionConfig,
    ReconstructionDetector,
};
pub use error::{AnomalyError, AnomalyResult};
pub use fallback::{FallbackChain, Resolved};
pub use features::{CleanSeries, FeatureMatrix, SeriesCleaner};
pub use metrics::{FeatureAnomalyDetail, FeatureImportance, Metrics, RunId, SyntheticEvaluation};
pub use preprocess::{PreprocessConfig, Preprocessor};
pub use result::DetectionResult;
pub use sample::{AnomalyKind, SampleConfig, SampleSeries};
pub use table::{Column, TimeSeriesTable, Value};
