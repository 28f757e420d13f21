//! Detector configuration.

use serde::{Deserialize, Serialize};

use crate::error::{AnomalyError, AnomalyResult};
use crate::preprocess::PreprocessConfig;

use super::{
    Algorithm, AnomalyDetector, ClusteringDetector, IsolationDetector, ReconstructionDetector,
};

/// Configuration for the [`IsolationDetector`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    /// Expected anomalous fraction, in `(0, 0.5]`.
    pub contamination: f64,
    pub n_estimators: usize,
    pub max_samples: usize,
    pub random_seed: u64,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            contamination: super::DEFAULT_CONTAMINATION,
            n_estimators: super::DEFAULT_N_ESTIMATORS,
            max_samples: super::DEFAULT_MAX_SAMPLES,
            random_seed: super::DEFAULT_RANDOM_SEED,
        }
    }
}

impl IsolationConfig {
    pub fn validate(&self) -> AnomalyResult<()> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(AnomalyError::Configuration(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_estimators == 0 || self.max_samples == 0 {
            return Err(AnomalyError::Configuration(
                "n_estimators and max_samples must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the [`ReconstructionDetector`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Percentile of the reconstruction error used as threshold, in `(0, 100)`.
    pub threshold_percentile: f64,
    pub n_components: usize,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            threshold_percentile: super::DEFAULT_THRESHOLD_PERCENTILE,
            n_components: super::DEFAULT_N_COMPONENTS,
        }
    }
}

impl ReconstructionConfig {
    pub fn validate(&self) -> AnomalyResult<()> {
        if !(self.threshold_percentile > 0.0 && self.threshold_percentile < 100.0) {
            return Err(AnomalyError::Configuration(format!(
                "threshold_percentile must be in (0, 100), got {}",
                self.threshold_percentile
            )));
        }
        if self.n_components == 0 {
            return Err(AnomalyError::Configuration("n_components must be at least 1".into()));
        }
        Ok(())
    }
}

/// Configuration for the [`ClusteringDetector`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub n_clusters: usize,
    pub window_size: usize,
    pub threshold_factor: f64,
    pub random_seed: u64,
    pub n_init: usize,
    pub max_iter: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            n_clusters: super::DEFAULT_N_CLUSTERS,
            window_size: super::DEFAULT_WINDOW_SIZE,
            threshold_factor: super::DEFAULT_THRESHOLD_FACTOR,
            random_seed: super::DEFAULT_RANDOM_SEED,
            n_init: super::DEFAULT_N_INIT,
            max_iter: super::DEFAULT_MAX_ITER,
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> AnomalyResult<()> {
        if self.n_clusters == 0 || self.window_size == 0 {
            return Err(AnomalyError::Configuration(
                "n_clusters and window_size must be at least 1".into(),
            ));
        }
        if !(self.threshold_factor.is_finite() && self.threshold_factor > 0.0) {
            return Err(AnomalyError::Configuration(format!(
                "threshold_factor must be a positive number, got {}",
                self.threshold_factor
            )));
        }
        if self.n_init == 0 || self.max_iter == 0 {
            return Err(AnomalyError::Configuration(
                "n_init and max_iter must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Everything a detection run can be configured with.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub isolation: IsolationConfig,
    pub reconstruction: ReconstructionConfig,
    pub clustering: ClusteringConfig,
    pub preprocessing: PreprocessConfig,
    /// Run the [`Preprocessor`](crate::preprocess::Preprocessor) before detection.
    pub preprocess: bool,
}

impl DetectionConfig {
    pub fn validate(&self) -> AnomalyResult<()> {
        self.isolation.validate()?;
        self.reconstruction.validate()?;
        self.clustering.validate()?;
        self.preprocessing.validate()
    }

    /// Build the configured detector for `algorithm`.
    pub fn detector(&self, algorithm: Algorithm) -> Box<dyn AnomalyDetector> {
        match algorithm {
            Algorithm::IsolationForest => Box::new(IsolationDetector::new(self.isolation.clone())),
            Algorithm::Autoencoder => {
                Box::new(ReconstructionDetector::new(self.reconstruction.clone()))
            }
            Algorithm::KMeans => Box::new(ClusteringDetector::new(self.clustering.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = DetectionConfig::default();
        assert_eq!(c.isolation.contamination, 0.05);
        assert_eq!(c.isolation.random_seed, 42);
        assert_eq!(c.reconstruction.threshold_percentile, 95.0);
        assert_eq!(c.reconstruction.n_components, 3);
        assert_eq!(c.clustering.n_clusters, 5);
        assert_eq!(c.clustering.window_size, 24);
        assert_eq!(c.clustering.threshold_factor, 1.5);
        assert!(!c.preprocess);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let mut c = DetectionConfig::default();
        c.isolation.contamination = 0.7;
        assert!(matches!(c.validate(), Err(AnomalyError::Configuration(_))));

        let mut c = DetectionConfig::default();
        c.reconstruction.threshold_percentile = 100.0;
        assert!(c.validate().is_err());

        let mut c = DetectionConfig::default();
        c.clustering.threshold_factor = 0.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn partial_json_config() {
        let c: DetectionConfig =
            serde_json::from_str(r#"{"clustering": {"n_clusters": 3}, "preprocess": true}"#).unwrap();
        assert_eq!(c.clustering.n_clusters, 3);
        assert_eq!(c.clustering.window_size, 24);
        assert!(c.preprocess);
        assert_eq!(c.isolation, IsolationConfig::default());
    }

    #[test]
    fn detector_factory_matches_algorithm() {
        let c = DetectionConfig::default();
        for a in Algorithm::ALL {
            assert_eq!(c.detector(a).algorithm(), a);
        }
    }
}
