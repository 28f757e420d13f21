//! Preprocessor: staged cleaning of a raw time-indexed table.
//!
//! Column resolution is the only step that can fail the call. Every later
//! stage maps the table to a new table; when a stage errors, it is logged and
//! skipped.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use tracing::{debug, warn};

use crate::error::{AnomalyError, AnomalyResult};
use crate::stats::{self, RollingStat};
use crate::table::{resolve_time_column, resolve_value_column, Column, TimeSeriesTable, Value};

use super::types::PreprocessConfig;
use super::ORIGINAL_VALUE_COLUMN;

/// Text layouts accepted for timestamps, tried in order.
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Resolved column names for one preprocessing call.
struct Target<'a> {
    time: &'a str,
    value: &'a str,
}

type Stage = fn(&Preprocessor, &TimeSeriesTable, &Target<'_>) -> AnomalyResult<TimeSeriesTable>;

/// Cleans a raw table and derives calendar, lag, and rolling features.
#[derive(Clone, Debug, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Clean `table` and return the enriched copy.
    ///
    /// Fails only when the configuration is invalid or when the time or value
    /// column can be neither found nor auto-detected.
    pub fn preprocess(
        &self,
        table: &TimeSeriesTable,
        time_column: Option<&str>,
        value_column: Option<&str>,
    ) -> AnomalyResult<TimeSeriesTable> {
        self.config.validate()?;
        let time = resolve_time_column(table, time_column)?;
        let value = resolve_value_column(table, value_column, Some(&time))?;
        let target = Target {
            time: &time,
            value: &value,
        };
        debug!(
            rows = table.len(),
            time_column = %time,
            value_column = %value,
            "preprocessing table"
        );

        let stages: [(&str, Stage); 8] = [
            ("parse-timestamps", Self::parse_timestamps),
            ("fill-values", Self::fill_values),
            ("sort-dedupe", Self::sort_and_dedupe),
            ("clip-outliers", Self::clip_outliers),
            ("calendar-features", Self::calendar_features),
            ("lag-features", Self::lag_features),
            ("rolling-features", Self::rolling_features),
            ("sanitize", Self::sanitize),
        ];

        let mut current = table.clone();
        for (name, stage) in stages {
            current = match stage(self, &current, &target) {
                Ok(next) => {
                    debug!(stage = name, rows = next.len(), "stage complete");
                    next
                }
                Err(e) => {
                    warn!(stage = name, error = %e, "preprocessing stage failed; keeping previous table");
                    current
                }
            };
        }
        Ok(current)
    }

    // ── Stages ──────────────────────────────────────────────────────────

    fn parse_timestamps(&self, table: &TimeSeriesTable, t: &Target<'_>) -> AnomalyResult<TimeSeriesTable> {
        let column = table
            .column(t.time)
            .ok_or_else(|| AnomalyError::computation("parse-timestamps", "time column vanished"))?;
        let parsed: Vec<Option<NaiveDateTime>> = column.values.iter().map(parse_timestamp).collect();
        let keep: Vec<usize> = parsed
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| ts.map(|_| i))
            .collect();
        if keep.is_empty() && !table.is_empty() {
            return Err(AnomalyError::computation(
                "parse-timestamps",
                format!("no value in '{}' parses as a timestamp", t.time),
            ));
        }
        let dropped = table.len() - keep.len();
        if dropped > 0 {
            warn!(dropped, column = t.time, "dropping rows with unparseable timestamps");
        }

        let mut out = table.clone();
        out.insert_column(Column::new(
            t.time,
            parsed
                .into_iter()
                .map(|ts| ts.map(Value::Timestamp).unwrap_or(Value::Missing))
                .collect(),
        ))?;
        Ok(out.select_rows(&keep))
    }

    fn fill_values(&self, table: &TimeSeriesTable, t: &Target<'_>) -> AnomalyResult<TimeSeriesTable> {
        let values = numeric_column(table, t.value, "fill-values")?;
        let gaps = values.iter().filter(|v| !v.is_finite()).count();
        if gaps == 0 {
            return Ok(table.clone());
        }
        let filled = stats::fill_non_finite(
            &stats::backward_fill(&stats::forward_fill(&stats::interpolate_linear(&values))),
            0.0,
        );
        debug!(gaps, column = t.value, "filled value gaps");
        let mut out = table.clone();
        out.set_numeric(t.value, &filled)?;
        Ok(out)
    }

    fn sort_and_dedupe(&self, table: &TimeSeriesTable, t: &Target<'_>) -> AnomalyResult<TimeSeriesTable> {
        let column = table
            .column(t.time)
            .ok_or_else(|| AnomalyError::computation("sort-dedupe", "time column vanished"))?;
        let stamps = column
            .values
            .iter()
            .map(Value::as_timestamp)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| AnomalyError::computation("sort-dedupe", "time column is not parsed"))?;

        let mut order: Vec<usize> = (0..stamps.len()).collect();
        order.sort_by_key(|&i| stamps[i]);
        order.dedup_by_key(|i| stamps[*i]);

        let removed = stamps.len() - order.len();
        if removed > 0 {
            debug!(removed, "removed duplicate timestamps");
        }
        Ok(table.select_rows(&order))
    }

    fn clip_outliers(&self, table: &TimeSeriesTable, t: &Target<'_>) -> AnomalyResult<TimeSeriesTable> {
        let values = numeric_column(table, t.value, "clip-outliers")?;
        let mut out = table.clone();
        out.set_numeric(ORIGINAL_VALUE_COLUMN, &values)?;

        match (stats::mean(&values), stats::std_dev(&values, 1)) {
            (Some(mean), Some(std)) if std > 0.0 && std.is_finite() => {
                let half = self.config.clip_sigma * std;
                let clipped = stats::clip(&values, mean - half, mean + half);
                let changed = clipped.iter().zip(&values).filter(|(a, b)| a != b).count();
                if changed > 0 {
                    debug!(changed, lower = mean - half, upper = mean + half, "clipped outliers");
                }
                out.set_numeric(t.value, &clipped)?;
            }
            _ => debug!(column = t.value, "zero or undefined spread; clipping skipped"),
        }
        Ok(out)
    }

    fn calendar_features(&self, table: &TimeSeriesTable, t: &Target<'_>) -> AnomalyResult<TimeSeriesTable> {
        let column = table
            .column(t.time)
            .ok_or_else(|| AnomalyError::computation("calendar-features", "time column vanished"))?;
        let stamps = column
            .values
            .iter()
            .map(Value::as_timestamp)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| AnomalyError::computation("calendar-features", "time column is not parsed"))?;

        let hour: Vec<f64> = stamps.iter().map(|ts| f64::from(ts.hour())).collect();
        let day_of_week: Vec<f64> = stamps
            .iter()
            .map(|ts| f64::from(ts.weekday().num_days_from_monday()))
            .collect();
        let month: Vec<f64> = stamps.iter().map(|ts| f64::from(ts.month())).collect();
        let is_weekend: Vec<f64> = day_of_week
            .iter()
            .map(|&d| if d >= 5.0 { 1.0 } else { 0.0 })
            .collect();

        let mut out = table.clone();
        out.set_numeric("hour", &hour)?;
        out.set_numeric("day_of_week", &day_of_week)?;
        out.set_numeric("month", &month)?;
        out.set_numeric("is_weekend", &is_weekend)?;
        Ok(out)
    }

    fn lag_features(&self, table: &TimeSeriesTable, t: &Target<'_>) -> AnomalyResult<TimeSeriesTable> {
        let values = numeric_column(table, t.value, "lag-features")?;
        let mut out = table.clone();
        for &lag in &self.config.lags {
            out.set_numeric(&format!("lag_{lag}"), &stats::shift(&values, lag, 0.0))?;
        }
        Ok(out)
    }

    fn rolling_features(&self, table: &TimeSeriesTable, t: &Target<'_>) -> AnomalyResult<TimeSeriesTable> {
        let values = numeric_column(table, t.value, "rolling-features")?;
        let w = self.config.rolling_window;
        let mean = stats::rolling(&values, w, 1, RollingStat::Mean);
        let std = stats::fill_non_finite(&stats::rolling(&values, w, 1, RollingStat::Std), 0.0);
        let mut out = table.clone();
        out.set_numeric(&format!("rolling_mean_{w}h"), &mean)?;
        out.set_numeric(&format!("rolling_std_{w}h"), &std)?;
        Ok(out)
    }

    /// Zero every residual NaN/Infinity (and missing cell) in numeric columns.
    fn sanitize(&self, table: &TimeSeriesTable, t: &Target<'_>) -> AnomalyResult<TimeSeriesTable> {
        let mut out = table.clone();
        let mut replaced = 0usize;
        for column in out.columns_mut() {
            if column.name == t.time || !column.is_numeric() {
                continue;
            }
            for cell in column.values.iter_mut() {
                let v = cell.as_f64().filter(|v| v.is_finite());
                if v.is_none() {
                    replaced += 1;
                }
                *cell = Value::Number(v.unwrap_or(0.0));
            }
        }
        if replaced > 0 {
            debug!(replaced, "zeroed non-finite cells");
        }
        Ok(out)
    }
}

fn numeric_column(table: &TimeSeriesTable, name: &str, stage: &str) -> AnomalyResult<Vec<f64>> {
    table
        .numeric(name)
        .ok_or_else(|| AnomalyError::computation(stage, format!("column '{name}' vanished")))
}

/// Interpret a cell as a timestamp. Numbers are Unix seconds.
fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Timestamp(ts) => Some(*ts),
        Value::Number(secs) if secs.is_finite() => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
            DateTime::from_timestamp(whole as i64, nanos).map(|dt| dt.naive_utc())
        }
        Value::Text(s) => parse_text_timestamp(s.trim()),
        _ => None,
    }
}

fn parse_text_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(values: &[&str]) -> Vec<Value> {
        values.iter().map(|s| Value::Text(s.to_string())).collect()
    }

    fn hourly(n: usize, values: &[f64]) -> TimeSeriesTable {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let stamps = (0..n)
            .map(|h| {
                let ts = start + chrono::Duration::hours(h as i64);
                Value::Text(ts.format("%Y-%m-%d %H:%M:%S").to_string())
            })
            .collect();
        TimeSeriesTable::from_columns(vec![
            Column::new("timestamp", stamps),
            Column::numeric("usage", values),
        ])
        .unwrap()
    }

    #[test]
    fn sorts_dedupes_and_drops_bad_timestamps() {
        let table = TimeSeriesTable::from_columns(vec![
            Column::new(
                "timestamp",
                text(&[
                    "2023-01-01 02:00:00",
                    "2023-01-01 00:00:00",
                    "not a date",
                    "2023-01-01 01:00:00",
                    "2023-01-01 00:00:00",
                ]),
            ),
            Column::numeric("usage", &[3.0, 1.0, 9.0, 2.0, 7.0]),
        ])
        .unwrap();

        let out = Preprocessor::with_defaults()
            .preprocess(&table, Some("timestamp"), Some("usage"))
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out.numeric(ORIGINAL_VALUE_COLUMN).unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(out.numeric("hour").unwrap(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn fills_gaps_in_priority_order() {
        let table = hourly(5, &[f64::NAN, 2.0, f64::NAN, 4.0, f64::INFINITY]);
        let out = Preprocessor::with_defaults()
            .preprocess(&table, None, None)
            .unwrap();
        assert_eq!(out.numeric(ORIGINAL_VALUE_COLUMN).unwrap(), vec![2.0, 2.0, 3.0, 4.0, 4.0]);
    }

    #[test]
    fn all_missing_values_become_zero() {
        let table = hourly(3, &[f64::NAN, f64::NAN, f64::NAN]);
        let out = Preprocessor::with_defaults()
            .preprocess(&table, None, None)
            .unwrap();
        assert_eq!(out.numeric("usage").unwrap(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn clipping_keeps_original_value() {
        let mut values = vec![10.0; 99];
        values.push(1000.0);
        let out = Preprocessor::with_defaults()
            .preprocess(&hourly(100, &values), None, None)
            .unwrap();
        let clipped = out.numeric("usage").unwrap();
        let original = out.numeric(ORIGINAL_VALUE_COLUMN).unwrap();
        assert_eq!(original[99], 1000.0);
        assert!(clipped[99] < 1000.0);
        assert_eq!(clipped[0], 10.0);
    }

    #[test]
    fn constant_series_is_not_clipped() {
        let out = Preprocessor::with_defaults()
            .preprocess(&hourly(4, &[5.0; 4]), None, None)
            .unwrap();
        assert_eq!(out.numeric("usage").unwrap(), vec![5.0; 4]);
        assert_eq!(out.numeric(ORIGINAL_VALUE_COLUMN).unwrap(), vec![5.0; 4]);
    }

    #[test]
    fn derives_calendar_lag_and_rolling_columns() {
        let table = TimeSeriesTable::from_columns(vec![
            Column::new(
                "date",
                text(&["2023-01-01T05:00:00", "2023-01-02T06:00:00", "2023-01-07T07:00:00"]),
            ),
            Column::numeric("kwh", &[1.0, 2.0, 3.0]),
        ])
        .unwrap();
        let out = Preprocessor::with_defaults()
            .preprocess(&table, None, None)
            .unwrap();

        assert_eq!(out.numeric("day_of_week").unwrap(), vec![6.0, 0.0, 5.0]);
        assert_eq!(out.numeric("is_weekend").unwrap(), vec![1.0, 0.0, 1.0]);
        assert_eq!(out.numeric("month").unwrap(), vec![1.0, 1.0, 1.0]);
        assert_eq!(out.numeric("lag_1").unwrap(), vec![0.0, 1.0, 2.0]);
        assert_eq!(out.numeric("lag_24").unwrap(), vec![0.0, 0.0, 0.0]);
        assert_eq!(out.numeric("rolling_mean_24h").unwrap(), vec![1.0, 1.5, 2.0]);
        assert_eq!(out.numeric("rolling_std_24h").unwrap()[0], 0.0);
    }

    #[test]
    fn epoch_seconds_are_timestamps() {
        let table = TimeSeriesTable::from_columns(vec![
            Column::numeric("timestamp", &[3600.0, 0.0]),
            Column::numeric("usage", &[2.0, 1.0]),
        ])
        .unwrap();
        let out = Preprocessor::with_defaults()
            .preprocess(&table, Some("timestamp"), Some("usage"))
            .unwrap();
        assert_eq!(out.numeric("hour").unwrap(), vec![0.0, 1.0]);
        assert_eq!(out.numeric("usage").unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn unparseable_time_column_degrades_instead_of_failing() {
        let table = TimeSeriesTable::from_columns(vec![
            Column::new("period", text(&["q1", "q2"])),
            Column::numeric("usage", &[1.0, f64::NAN]),
        ])
        .unwrap();
        let out = Preprocessor::with_defaults()
            .preprocess(&table, None, None)
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.numeric("usage").unwrap(), vec![1.0, 1.0]);
        assert!(!out.has_column("hour"));
        assert!(out.has_column("lag_1"));
    }

    #[test]
    fn named_time_column_without_any_date_keeps_every_row() {
        let table = TimeSeriesTable::from_columns(vec![
            Column::new("timestamp", text(&["soon", "later", "never"])),
            Column::numeric("usage", &[4.0, 5.0, 6.0]),
        ])
        .unwrap();
        let out = Preprocessor::with_defaults()
            .preprocess(&table, Some("timestamp"), Some("usage"))
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out.numeric(ORIGINAL_VALUE_COLUMN).unwrap(), vec![4.0, 5.0, 6.0]);
        assert!(!out.has_column("hour"));
    }

    #[test]
    fn missing_time_column_is_configuration_error() {
        let table = TimeSeriesTable::from_columns(vec![Column::numeric("usage", &[1.0])]).unwrap();
        let err = Preprocessor::with_defaults()
            .preprocess(&table, Some("timestamp"), None)
            .unwrap_err();
        assert!(matches!(err, AnomalyError::Configuration(_)));
    }
}
