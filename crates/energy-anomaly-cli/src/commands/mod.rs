//! Subcommand implementations and their shared input handling.

pub mod detect;
pub mod preprocess;
pub mod sample;

use std::io::Read;
use std::path::Path;

use energy_anomaly::TimeSeriesTable;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Read a JSON array of row objects from `input`, or from stdin when it is `-`.
pub fn read_table(input: &str) -> CliResult<TimeSeriesTable> {
    let text = if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(Path::new(input))?
    };
    parse_records(&text)
}

pub fn parse_records(text: &str) -> CliResult<TimeSeriesTable> {
    let records: Vec<Map<String, Value>> = serde_json::from_str(text)?;
    if records.is_empty() {
        return Err(CliError::InvalidInput("input contains no rows".into()));
    }
    let table = TimeSeriesTable::from_records(&records);
    debug!(rows = table.len(), columns = ?table.column_names(), "loaded table");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_in_column_order() {
        let t = parse_records(r#"[{"time": "2023-01-01T00:00:00", "kwh": 1.5}, {"time": "2023-01-01T01:00:00", "kwh": null}]"#)
            .unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.column_names(), vec!["time", "kwh"]);
    }

    #[test]
    fn empty_and_malformed_input_are_errors() {
        assert!(matches!(parse_records("[]"), Err(CliError::InvalidInput(_))));
        assert!(matches!(parse_records("{"), Err(CliError::Json(_))));
    }
}
