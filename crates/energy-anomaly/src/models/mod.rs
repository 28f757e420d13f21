//! Unsupervised models behind the detectors.
//!
//! All three operate on `ndarray::Array2<f64>` (rows = samples), are seeded
//! where randomness is involved, and report numeric trouble as
//! `AnomalyError::Computation` so callers can fall back.

pub mod isolation_forest;
pub mod kmeans;
pub mod pca;

pub use isolation_forest::{average_path_length, FittedForest, IsolationForest};
pub use kmeans::{nearest, squared_distance, FittedKMeans, KMeans};
pub use pca::{symmetric_eigen, FittedPca, Pca};
