//! Detection runs

use std::path::PathBuf;

use clap::Args;
use energy_anomaly::table::detect_time_column;
use energy_anomaly::{run_detection, Algorithm, DetectionConfig};

use crate::error::CliResult;
use crate::output::{self, OutputFormat};

/// Arguments for `detect`
#[derive(Args, Debug, Default)]
pub struct DetectArgs {
    /// JSON records file, or `-` for stdin
    #[arg(short, long)]
    pub input: String,

    /// isolation_forest, autoencoder, or kmeans
    #[arg(short, long, default_value = "isolation_forest")]
    pub algorithm: String,

    #[arg(long)]
    pub time_column: Option<String>,

    #[arg(long)]
    pub value_column: Option<String>,

    /// Run the preprocessor first
    #[arg(long)]
    pub preprocess: bool,

    /// DetectionConfig as JSON; flags below override it
    #[arg(long, env = "ENERGY_ANOMALY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Isolation forest contamination, in (0, 0.5]
    #[arg(long)]
    pub contamination: Option<f64>,

    /// Reconstruction threshold percentile
    #[arg(long)]
    pub percentile: Option<f64>,

    /// Reconstruction components
    #[arg(long)]
    pub components: Option<usize>,

    /// k-means clusters
    #[arg(long)]
    pub clusters: Option<usize>,

    /// Clustering rolling window
    #[arg(long)]
    pub window: Option<usize>,

    /// Clustering distance threshold factor
    #[arg(long)]
    pub threshold_factor: Option<f64>,

    /// Seed for isolation forest and k-means
    #[arg(long)]
    pub seed: Option<u64>,

    /// Also print the flagged rows
    #[arg(long)]
    pub rows: bool,
}

impl DetectArgs {
    /// Loaded config file (or defaults) with flag overrides applied.
    pub fn detection_config(&self) -> CliResult<DetectionConfig> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => DetectionConfig::default(),
        };
        if self.preprocess {
            config.preprocess = true;
        }
        if let Some(v) = self.contamination {
            config.isolation.contamination = v;
        }
        if let Some(v) = self.percentile {
            config.reconstruction.threshold_percentile = v;
        }
        if let Some(v) = self.components {
            config.reconstruction.n_components = v;
        }
        if let Some(v) = self.clusters {
            config.clustering.n_clusters = v;
        }
        if let Some(v) = self.window {
            config.clustering.window_size = v;
        }
        if let Some(v) = self.threshold_factor {
            config.clustering.threshold_factor = v;
        }
        if let Some(v) = self.seed {
            config.isolation.random_seed = v;
            config.clustering.random_seed = v;
        }
        Ok(config)
    }
}

/// Execute `detect`.
pub fn execute(args: DetectArgs, format: OutputFormat) -> CliResult<()> {
    let algorithm: Algorithm = args.algorithm.parse()?;
    let config = args.detection_config()?;
    let table = super::read_table(&args.input)?;

    let (result, metrics) = run_detection(
        &table,
        algorithm,
        args.time_column.as_deref(),
        args.value_column.as_deref(),
        &config,
    )?;

    let rows = args.rows.then(|| {
        let time = args
            .time_column
            .clone()
            .filter(|c| result.table.has_column(c))
            .or_else(|| detect_time_column(&result.table));
        output::anomaly_rows(&result, time.as_deref())
    });
    output::print_detection(&metrics, rows, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = DetectArgs {
            contamination: Some(0.1),
            clusters: Some(3),
            seed: Some(7),
            preprocess: true,
            ..DetectArgs::default()
        };
        let c = args.detection_config().unwrap();
        assert_eq!(c.isolation.contamination, 0.1);
        assert_eq!(c.clustering.n_clusters, 3);
        assert_eq!(c.isolation.random_seed, 7);
        assert_eq!(c.clustering.random_seed, 7);
        assert!(c.preprocess);
        assert_eq!(c.reconstruction.n_components, 3);
    }
}
