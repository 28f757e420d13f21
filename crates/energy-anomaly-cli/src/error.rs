//! CLI error types

use energy_anomaly::AnomalyError;
use thiserror::Error;

/// CLI error type
#[derive(Error, Debug)]
pub enum CliError {
    /// Detection and preprocessing errors, printed as-is.
    #[error("{0}")]
    Anomaly(#[from] AnomalyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anomaly_errors_keep_their_message() {
        let e: CliError = AnomalyError::Configuration("value column 'kwh' not found".into()).into();
        assert_eq!(e.to_string(), "configuration error: value column 'kwh' not found");
    }
}
