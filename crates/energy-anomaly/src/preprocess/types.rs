use serde::{Deserialize, Serialize};

use crate::error::{AnomalyError, AnomalyResult};

/// Configuration for the [`Preprocessor`](super::Preprocessor).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Values are clipped to `mean ± clip_sigma · std`.
    pub clip_sigma: f64,
    /// Lag offsets for `lag_N` columns.
    pub lags: Vec<usize>,
    /// Window for `rolling_mean_Nh` / `rolling_std_Nh`.
    pub rolling_window: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            clip_sigma: super::DEFAULT_CLIP_SIGMA,
            lags: super::DEFAULT_LAGS.to_vec(),
            rolling_window: super::DEFAULT_ROLLING_WINDOW,
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> AnomalyResult<()> {
        if !(self.clip_sigma.is_finite() && self.clip_sigma > 0.0) {
            return Err(AnomalyError::Configuration(format!(
                "clip_sigma must be a positive number, got {}",
                self.clip_sigma
            )));
        }
        if self.rolling_window == 0 {
            return Err(AnomalyError::Configuration(
                "rolling_window must be at least 1".into(),
            ));
        }
        if self.lags.contains(&0) {
            return Err(AnomalyError::Configuration("lag offsets must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = PreprocessConfig::default();
        assert_eq!(c.lags, vec![1, 6, 12, 24]);
        assert_eq!(c.rolling_window, 24);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn rejects_nonsense() {
        let c = PreprocessConfig {
            clip_sigma: -1.0,
            ..Default::default()
        };
        assert!(c.validate().is_err());

        let c = PreprocessConfig {
            lags: vec![0],
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let c: PreprocessConfig = serde_json::from_str(r#"{"clip_sigma": 3.0}"#).unwrap();
        assert_eq!(c.clip_sigma, 3.0);
        assert_eq!(c.rolling_window, 24);
    }
}
