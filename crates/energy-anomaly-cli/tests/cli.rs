use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    Command::cargo_bin("energy-anomaly").unwrap()
}

fn sample_json(rows: usize) -> String {
    let out = cli()
        .args(["sample", "--rows", &rows.to_string(), "--spikes-only"])
        .output()
        .unwrap();
    assert!(out.status.success());
    String::from_utf8(out.stdout).unwrap()
}

#[test]
fn sample_writes_json_records() {
    let text = sample_json(48);
    let records: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
    assert_eq!(records.len(), 48);
    assert!(records[0].get("timestamp").is_some());
    assert!(records[0].get("energy_consumption").is_some());
}

#[test]
fn detect_reads_stdin_and_prints_json_metrics() {
    cli()
        .args(["detect", "--input", "-", "--algorithm", "kmeans", "--output", "json"])
        .write_stdin(sample_json(200))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"anomaly_count\""))
        .stdout(predicate::str::contains("\"clusters\": 5"));
}

#[test]
fn detect_table_output_lists_rows() {
    cli()
        .args([
            "detect",
            "-i",
            "-",
            "-a",
            "autoencoder",
            "--time-column",
            "timestamp",
            "--value-column",
            "energy_consumption",
            "--preprocess",
            "--rows",
        ])
        .write_stdin(sample_json(200))
        .assert()
        .success()
        .stdout(predicate::str::contains("Detection: autoencoder"))
        .stdout(predicate::str::contains("2023-01-"));
}

#[test]
fn preprocess_adds_derived_columns() {
    cli()
        .args(["preprocess", "--input", "-"])
        .write_stdin(sample_json(72))
        .assert()
        .success()
        .stdout(predicate::str::contains("original_value"))
        .stdout(predicate::str::contains("rolling_mean_24h"));
}

#[test]
fn unknown_algorithm_fails_with_message() {
    cli()
        .args(["detect", "--input", "-", "--algorithm", "svm"])
        .write_stdin(sample_json(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown algorithm 'svm'"));
}

#[test]
fn invalid_contamination_is_reported() {
    cli()
        .args(["detect", "--input", "-", "--contamination", "0.9"])
        .write_stdin(sample_json(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("contamination"));
}

#[test]
fn missing_input_file_fails() {
    cli()
        .args(["detect", "--input", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("IO error"));
}
