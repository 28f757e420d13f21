//! Table preprocessing

use clap::Args;
use energy_anomaly::{PreprocessConfig, Preprocessor};

use crate::error::CliResult;
use crate::output;

/// Arguments for `preprocess`
#[derive(Args, Debug)]
pub struct PreprocessArgs {
    /// JSON records file, or `-` for stdin
    #[arg(short, long)]
    pub input: String,

    /// Time column (detected by name when absent)
    #[arg(long)]
    pub time_column: Option<String>,

    /// Value column (first numeric column when absent)
    #[arg(long)]
    pub value_column: Option<String>,

    /// Clip values beyond this many standard deviations
    #[arg(long)]
    pub clip_sigma: Option<f64>,
}

/// Execute `preprocess`: cleaned table as JSON records on stdout.
pub fn execute(args: PreprocessArgs) -> CliResult<()> {
    let table = super::read_table(&args.input)?;
    let mut config = PreprocessConfig::default();
    if let Some(sigma) = args.clip_sigma {
        config.clip_sigma = sigma;
    }
    let processed = Preprocessor::new(config).preprocess(
        &table,
        args.time_column.as_deref(),
        args.value_column.as_deref(),
    )?;
    tracing::info!(
        rows_in = table.len(),
        rows_out = processed.len(),
        columns = processed.column_names().len(),
        "preprocessed"
    );
    output::print_records(&processed)
}
