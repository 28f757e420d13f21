//! Table type definitions.
//!
//! A `TimeSeriesTable` is stored column-major: every column holds one
//! `Value` per row and all columns have the same length. Rows are addressed
//! by position; the caller's row order is preserved by every detector.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{AnomalyError, AnomalyResult};

/// Format used when a timestamp is rendered back to text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ── Cell Values ─────────────────────────────────────────────────────────

/// A single table cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent value (`null` in JSON).
    Missing,
    /// Numeric value. May be NaN or infinite before cleaning.
    Number(f64),
    /// Parsed timestamp (timezone-naive).
    Timestamp(NaiveDateTime),
    /// Anything else.
    Text(String),
}

impl Value {
    /// Numeric view of the cell. Text is parsed; timestamps are not numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Missing | Self::Timestamp(_) => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Missing, or a number that is not finite.
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Number(v) => !v.is_finite(),
            _ => false,
        }
    }

    /// Whether this cell can take part in a numeric column.
    fn is_numeric_like(&self) -> bool {
        matches!(self, Self::Missing | Self::Number(_)) || self.as_f64().is_some()
    }

    /// Convert a JSON value into a cell. ISO-8601 strings become timestamps.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Missing,
            serde_json::Value::Bool(b) => Self::Number(if *b { 1.0 } else { 0.0 }),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number).unwrap_or(Self::Missing),
            serde_json::Value::String(s) => parse_iso_timestamp(s)
                .map(Self::Timestamp)
                .unwrap_or_else(|| Self::Text(s.clone())),
            other => Self::Text(other.to_string()),
        }
    }

    /// Render the cell as JSON. Non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Missing => serde_json::Value::Null,
            Self::Number(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Timestamp(ts) => serde_json::Value::String(ts.format(TIMESTAMP_FORMAT).to_string()),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Strict ISO-8601 parse (`T` separator, optional fraction, optional offset).
fn parse_iso_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
}

// ── Columns ─────────────────────────────────────────────────────────────

/// A named column of cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Build a numeric column.
    pub fn numeric(name: impl Into<String>, values: &[f64]) -> Self {
        Self::new(name, values.iter().copied().map(Value::Number).collect())
    }

    /// Numeric view of every cell; non-numeric cells become NaN.
    pub fn to_f64(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|v| v.as_f64().unwrap_or(f64::NAN))
            .collect()
    }

    /// Whether every cell is numeric or missing. An all-missing column is
    /// numeric (it simply has no usable values).
    pub fn is_numeric(&self) -> bool {
        !self.values.is_empty() && self.values.iter().all(Value::is_numeric_like)
    }

    /// Whether the column holds at least one finite number.
    pub fn has_finite(&self) -> bool {
        self.values
            .iter()
            .any(|v| v.as_f64().is_some_and(f64::is_finite))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ── Table ───────────────────────────────────────────────────────────────

/// Ordered rows of named cells, stored column-major.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesTable {
    columns: Vec<Column>,
}

impl TimeSeriesTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from columns of equal length.
    pub fn from_columns(columns: Vec<Column>) -> AnomalyResult<Self> {
        if let Some(first) = columns.first() {
            if let Some(bad) = columns.iter().find(|c| c.len() != first.len()) {
                return Err(AnomalyError::Configuration(format!(
                    "column '{}' has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    first.len()
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Builder-style column insertion; replaces a column of the same name.
    pub fn with_column(mut self, column: Column) -> AnomalyResult<Self> {
        self.insert_column(column)?;
        Ok(self)
    }

    /// Insert or replace a column. Its length must match the table's.
    pub fn insert_column(&mut self, column: Column) -> AnomalyResult<()> {
        if !self.columns.is_empty() && column.len() != self.len() {
            return Err(AnomalyError::Configuration(format!(
                "column '{}' has {} rows, table has {}",
                column.name,
                column.len(),
                self.len()
            )));
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Insert or replace a numeric column.
    pub fn set_numeric(&mut self, name: &str, values: &[f64]) -> AnomalyResult<()> {
        self.insert_column(Column::numeric(name, values))
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Numeric view of a column, if present.
    pub fn numeric(&self, name: &str) -> Option<Vec<f64>> {
        self.column(name).map(Column::to_f64)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cells of one row, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<(&str, &Value)>> {
        if index >= self.len() {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| (c.name.as_str(), &c.values[index]))
                .collect(),
        )
    }

    /// New table containing the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: indices
                    .iter()
                    .filter_map(|&i| c.values.get(i).cloned())
                    .collect(),
            })
            .collect();
        Self { columns }
    }

    /// Build a table from JSON records. Column order follows first appearance;
    /// keys absent from a record become missing cells.
    pub fn from_records(records: &[serde_json::Map<String, serde_json::Value>]) -> Self {
        let mut names: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
        let columns = names
            .into_iter()
            .map(|name| {
                let values = records
                    .iter()
                    .map(|r| r.get(&name).map(Value::from_json).unwrap_or(Value::Missing))
                    .collect();
                Column { name, values }
            })
            .collect();
        Self { columns }
    }

    /// Render the table as JSON records.
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        (0..self.len())
            .filter_map(|i| self.row(i))
            .map(|cells| {
                cells
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value.to_json()))
                    .collect()
            })
            .collect()
    }
}
