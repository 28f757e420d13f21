//! Time-indexed tables and column discovery.
//!
//! ```text
//!   caller rows ──► TimeSeriesTable (column-major, row order preserved)
//!                        │
//!                        ├── resolve_time_column   (hint → name heuristic)
//!                        ├── resolve_value_column  (hint → first numeric, non-excluded)
//!                        └── feature_columns       (all numeric, non-excluded)
//! ```

pub mod columns;
pub mod types;

pub use columns::{
    detect_time_column, detect_value_column, feature_columns, resolve_time_column,
    resolve_value_column, FEATURE_COLUMN_EXCLUSIONS, TIME_COLUMN_HINTS, VALUE_COLUMN_EXCLUSIONS,
};
pub use types::{Column, TimeSeriesTable, Value, TIMESTAMP_FORMAT};
