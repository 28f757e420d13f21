//! Column discovery by name heuristics.
//!
//! Callers usually pass column hints, but uploaded tables arrive with
//! arbitrary headers. When a hint is absent or does not name an existing
//! column, these helpers pick a substitute from the column names.

use tracing::{debug, warn};

use crate::error::{AnomalyError, AnomalyResult};

use super::types::TimeSeriesTable;

/// Case-insensitive substrings that mark a timestamp-like column.
pub const TIME_COLUMN_HINTS: [&str; 4] = ["time", "date", "timestamp", "period"];

/// Substrings that disqualify a column from being the detection target.
pub const VALUE_COLUMN_EXCLUSIONS: [&str; 6] = ["id", "code", "category", "type", "class", "year"];

/// Substrings that disqualify a column from multi-column feature selection.
pub const FEATURE_COLUMN_EXCLUSIONS: [&str; 5] = ["date", "time", "timestamp", "id", "index"];

fn name_matches(name: &str, patterns: &[&str]) -> bool {
    let lower = name.to_lowercase();
    patterns.iter().any(|p| lower.contains(p))
}

/// First column whose name looks like a timestamp.
pub fn detect_time_column(table: &TimeSeriesTable) -> Option<String> {
    table
        .columns()
        .iter()
        .find(|c| name_matches(&c.name, &TIME_COLUMN_HINTS))
        .map(|c| c.name.clone())
}

/// First numeric column that is not excluded by name and is not `skip`.
pub fn detect_value_column(table: &TimeSeriesTable, skip: Option<&str>) -> Option<String> {
    table
        .columns()
        .iter()
        .filter(|c| Some(c.name.as_str()) != skip)
        .find(|c| c.is_numeric() && !name_matches(&c.name, &VALUE_COLUMN_EXCLUSIONS))
        .map(|c| c.name.clone())
}

/// Resolve the time column from a hint, falling back to name detection.
pub fn resolve_time_column(table: &TimeSeriesTable, hint: Option<&str>) -> AnomalyResult<String> {
    if let Some(name) = hint.filter(|h| table.has_column(h)) {
        return Ok(name.to_string());
    }
    match detect_time_column(table) {
        Some(found) => {
            if let Some(h) = hint {
                warn!(hint = h, substitute = %found, "time column not found; using detected column");
            } else {
                debug!(column = %found, "time column detected");
            }
            Ok(found)
        }
        None => Err(AnomalyError::Configuration(format!(
            "time column {} not found and no column name matches {:?} (columns: {:?})",
            hint.map(|h| format!("'{}'", h)).unwrap_or_else(|| "<unset>".into()),
            TIME_COLUMN_HINTS,
            table.column_names()
        ))),
    }
}

/// Resolve the value column from a hint, falling back to the first numeric,
/// non-excluded column other than `time_column`.
pub fn resolve_value_column(
    table: &TimeSeriesTable,
    hint: Option<&str>,
    time_column: Option<&str>,
) -> AnomalyResult<String> {
    if let Some(name) = hint.filter(|h| table.has_column(h)) {
        return Ok(name.to_string());
    }
    match detect_value_column(table, time_column) {
        Some(found) => {
            if let Some(h) = hint {
                warn!(hint = h, substitute = %found, "value column not found; using detected column");
            } else {
                debug!(column = %found, "value column detected");
            }
            Ok(found)
        }
        None => Err(AnomalyError::Configuration(format!(
            "value column {} not found and no numeric column qualifies (columns: {:?})",
            hint.map(|h| format!("'{}'", h)).unwrap_or_else(|| "<unset>".into()),
            table.column_names()
        ))),
    }
}

/// Numeric columns eligible for multi-column detection, in table order.
pub fn feature_columns(table: &TimeSeriesTable) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|c| c.is_numeric() && !name_matches(&c.name, &FEATURE_COLUMN_EXCLUSIONS))
        .map(|c| c.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, Value};

    fn table() -> TimeSeriesTable {
        TimeSeriesTable::from_columns(vec![
            Column::numeric("meter_id", &[1.0, 2.0]),
            Column::new("Reading Date", vec!["2023-01-01".into(), "2023-01-02".into()]),
            Column::new("site", vec!["a".into(), "b".into()]),
            Column::numeric("kwh", &[3.0, 4.0]),
            Column::numeric("row_index", &[0.0, 1.0]),
        ])
        .unwrap()
    }

    #[test]
    fn time_column_detected_case_insensitively() {
        assert_eq!(detect_time_column(&table()).as_deref(), Some("Reading Date"));
    }

    #[test]
    fn value_column_skips_identifiers_and_text() {
        assert_eq!(detect_value_column(&table(), None).as_deref(), Some("kwh"));
        assert_eq!(detect_value_column(&table(), Some("kwh")).as_deref(), Some("row_index"));
    }

    #[test]
    fn hint_wins_when_present() {
        let t = table();
        assert_eq!(resolve_value_column(&t, Some("row_index"), None).unwrap(), "row_index");
        assert_eq!(resolve_value_column(&t, Some("missing"), None).unwrap(), "kwh");
        assert_eq!(resolve_time_column(&t, Some("nope")).unwrap(), "Reading Date");
    }

    #[test]
    fn unresolvable_columns_are_configuration_errors() {
        let t = TimeSeriesTable::from_columns(vec![Column::new("site", vec![Value::Text("a".into())])])
            .unwrap();
        assert!(matches!(
            resolve_value_column(&t, Some("kwh"), None),
            Err(AnomalyError::Configuration(_))
        ));
        assert!(matches!(
            resolve_time_column(&t, None),
            Err(AnomalyError::Configuration(_))
        ));
    }

    #[test]
    fn feature_columns_apply_exclusions() {
        assert_eq!(feature_columns(&table()), vec!["kwh".to_string()]);
    }
}
