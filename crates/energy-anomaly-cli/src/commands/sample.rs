//! Synthetic series generation

use clap::Args;
use energy_anomaly::sample::{self, SampleConfig};

use crate::error::CliResult;
use crate::output;

/// Arguments for `sample`
#[derive(Args, Debug)]
pub struct SampleArgs {
    /// Number of hourly rows
    #[arg(long, default_value = "1000")]
    pub rows: usize,

    /// Percentage of rows that start an anomaly
    #[arg(long, default_value = "5")]
    pub anomaly_percentage: f64,

    /// Random seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Inject spikes only and drop the weekly cycle
    #[arg(long)]
    pub spikes_only: bool,
}

impl SampleArgs {
    fn config(&self) -> SampleConfig {
        let config = SampleConfig {
            rows: self.rows,
            anomaly_percentage: self.anomaly_percentage,
            seed: self.seed,
            ..SampleConfig::default()
        };
        if self.spikes_only {
            config.spikes_only()
        } else {
            config
        }
    }
}

/// Execute `sample`: JSON records on stdout.
pub fn execute(args: SampleArgs) -> CliResult<()> {
    let series = sample::generate(&args.config())?;
    tracing::info!(
        rows = series.table.len(),
        anomalies = series.anomaly_indices.len(),
        "sample generated"
    );
    output::print_records(&series.table)
}
