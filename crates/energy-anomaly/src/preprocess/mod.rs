//! Table preprocessing: timestamp parsing, gap filling, ordering, outlier
//! capping, and calendar/lag/rolling feature derivation.
//!
//! ## Architecture
//!
//! ```text
//!   TimeSeriesTable ──► Preprocessor ──► cleaned TimeSeriesTable
//!                          │
//!                          ├── parse timestamps (unparseable rows dropped)
//!                          ├── fill value gaps (interpolate → ffill → bfill → 0)
//!                          ├── sort + dedupe on timestamp
//!                          ├── clip to mean ± k·std (original_value kept)
//!                          ├── calendar: hour, day_of_week, month, is_weekend
//!                          ├── lag_N and rolling mean/std
//!                          └── zero residual NaN/Infinity
//! ```
//!
//! Stages after column resolution never abort the call: a failing stage is
//! logged and the table as of the previous stage is carried forward.

pub mod engine;
pub mod types;

pub use engine::Preprocessor;
pub use types::PreprocessConfig;

/// Outlier clipping half-width in standard deviations.
pub const DEFAULT_CLIP_SIGMA: f64 = 5.0;

/// Lag offsets, in rows, for the derived `lag_N` columns.
pub const DEFAULT_LAGS: [usize; 4] = [1, 6, 12, 24];

/// Window for the derived rolling mean/std columns.
pub const DEFAULT_ROLLING_WINDOW: usize = 24;

/// Column that keeps the value column as it was before clipping.
pub const ORIGINAL_VALUE_COLUMN: &str = "original_value";
