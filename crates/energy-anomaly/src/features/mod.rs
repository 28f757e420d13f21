//! Shared feature engineering for all detectors.
//!
//! ```text
//!   raw column ──► SeriesCleaner ──► CleanSeries ──► rolling / diff builders
//!                  (median impute,                        │
//!                   k·std clip)                           ▼
//!                                                  FeatureMatrix (ndarray)
//!                                                  no NaN/Infinity, ever
//! ```

pub mod clean;
pub mod matrix;

pub use clean::{rolling_feature, CleanSeries, SeriesCleaner};
pub use matrix::FeatureMatrix;

/// Default clipping half-width for detector-side cleaning, in standard deviations.
pub const DEFAULT_CLIP_SIGMA: f64 = 5.0;
