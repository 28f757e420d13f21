use thiserror::Error;

/// Errors from the anomaly-detection core.
///
/// Only [`AnomalyError::Configuration`] and [`AnomalyError::NoFeatures`] ever
/// escape a detection or preprocessing call. [`AnomalyError::Computation`]
/// travels inside fallback chains and is logged, then replaced by a simpler
/// strategy.
#[derive(Debug, Error)]
pub enum AnomalyError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no usable numeric features: {0}")]
    NoFeatures(String),

    #[error("computation failed in {stage}: {detail}")]
    Computation { stage: String, detail: String },
}

impl AnomalyError {
    /// Build a degraded-computation error for a named stage.
    pub fn computation(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Computation {
            stage: stage.into(),
            detail: detail.into(),
        }
    }

    /// Whether this error must be surfaced to the caller instead of being
    /// absorbed by a fallback.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::NoFeatures(_))
    }
}

impl From<ndarray::ShapeError> for AnomalyError {
    fn from(e: ndarray::ShapeError) -> Self {
        AnomalyError::computation("feature-matrix", e.to_string())
    }
}

/// Convenience type alias for anomaly-detection results.
pub type AnomalyResult<T> = Result<T, AnomalyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = AnomalyError::Configuration("value column 'kwh' not found".into());
        assert!(e.to_string().contains("kwh"));

        let e = AnomalyError::NoFeatures("all candidate columns excluded".into());
        assert!(e.to_string().contains("excluded"));

        let e = AnomalyError::computation("pca", "too few rows");
        assert!(e.to_string().contains("pca"));
        assert!(e.to_string().contains("too few rows"));
    }

    #[test]
    fn only_input_errors_are_fatal() {
        assert!(AnomalyError::Configuration("x".into()).is_fatal());
        assert!(AnomalyError::NoFeatures("x".into()).is_fatal());
        assert!(!AnomalyError::computation("kmeans", "diverged").is_fatal());
    }

    #[test]
    fn shape_error_conversion_is_degraded() {
        let shape_err = ndarray::Array2::<f64>::from_shape_vec((2, 2), vec![1.0]).unwrap_err();
        let err: AnomalyError = shape_err.into();
        assert!(!err.is_fatal());
    }

    #[test]
    fn result_type_works() {
        let ok: AnomalyResult<u32> = Ok(7);
        assert_eq!(ok.unwrap(), 7);

        let err: AnomalyResult<u32> = Err(AnomalyError::NoFeatures("none".into()));
        assert!(err.is_err());
    }
}
