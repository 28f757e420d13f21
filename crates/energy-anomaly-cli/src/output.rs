//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use energy_anomaly::{DetectionResult, Metrics, TimeSeriesTable};
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::error::CliResult;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

#[derive(Tabled)]
struct MetricRow {
    metric: &'static str,
    value: String,
}

#[derive(Serialize, Tabled)]
struct ImportanceRow {
    feature: String,
    importance: String,
}

/// One flagged row for display.
#[derive(Serialize, Tabled)]
pub struct AnomalyRow {
    pub row: usize,
    pub time: String,
    pub score: String,
    pub cluster: String,
}

pub fn print_json<T: Serialize + ?Sized>(data: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Print a table as JSON records.
pub fn print_records(table: &TimeSeriesTable) -> CliResult<()> {
    print_json(&table.to_records())
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Flagged rows of `result`, with the time column rendered when known.
pub fn anomaly_rows(result: &DetectionResult, time_column: Option<&str>) -> Vec<AnomalyRow> {
    let time = time_column.and_then(|c| result.table.column(c));
    result
        .anomalous_rows()
        .into_iter()
        .map(|i| AnomalyRow {
            row: i,
            time: time
                .and_then(|c| c.values.get(i))
                .map_or_else(|| "-".to_string(), |v| match v.to_json() {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                }),
            score: format!("{:.4}", result.anomaly_score[i]),
            cluster: opt(result.cluster.as_ref().map(|c| c[i])),
        })
        .collect()
}

/// Print metrics, and optionally the flagged rows.
pub fn print_detection(
    metrics: &Metrics,
    rows: Option<Vec<AnomalyRow>>,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => match rows {
            Some(rows) => print_json(&serde_json::json!({ "metrics": metrics, "anomalies": rows })),
            None => print_json(metrics),
        },
        OutputFormat::Table => {
            println!("{}", format!("Detection: {}", metrics.algorithm).bold().cyan());
            let summary = vec![
                MetricRow { metric: "run", value: metrics.run_id.to_string() },
                MetricRow { metric: "anomalies", value: metrics.anomaly_count.to_string() },
                MetricRow { metric: "total points", value: metrics.total_points.to_string() },
                MetricRow { metric: "anomaly rate", value: format!("{:.2}%", metrics.anomaly_rate() * 100.0) },
                MetricRow { metric: "precision", value: format!("{:.4}", metrics.precision) },
                MetricRow { metric: "recall", value: format!("{:.4}", metrics.recall) },
                MetricRow { metric: "f1 score", value: format!("{:.4}", metrics.f1_score) },
                MetricRow { metric: "threshold", value: opt(metrics.threshold.map(|t| format!("{t:.4}"))) },
                MetricRow { metric: "clusters", value: opt(metrics.clusters) },
                MetricRow { metric: "components", value: opt(metrics.n_components) },
            ];
            println!("{}", Table::new(summary));

            if !metrics.feature_importance.is_empty() {
                println!();
                println!("{}", "Feature importance".bold());
                let importance: Vec<ImportanceRow> = metrics
                    .feature_importance
                    .iter()
                    .map(|f| ImportanceRow {
                        feature: f.feature.clone(),
                        importance: format!("{:.4}", f.importance),
                    })
                    .collect();
                println!("{}", Table::new(importance));
            }
            if let Some(note) = &metrics.note {
                println!("{} {}", "⚠".yellow(), note);
            }
            if let Some(rows) = rows {
                println!();
                if rows.is_empty() {
                    println!("{}", "No anomalies".dimmed());
                } else {
                    println!("{}", Table::new(rows));
                }
            }
            Ok(())
        }
    }
}
