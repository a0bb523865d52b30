use serde_json::Value;
use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

fn folio(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_folio"))
        .args(args)
        .output()
        .expect("failed to run folio")
}

fn folio_with_stdin(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_folio"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run folio");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_optimize_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.json");
    fs::write(
        &input,
        r#"{
            "asset_names": ["A", "B"],
            "annualized_returns": [0.10, 0.05],
            "covariance_matrix": [[0.05, 0.01], [0.01, 0.03]],
            "initial_weights": [0.5, 0.5],
            "transaction_costs": [0.0, 0.0]
        }"#,
    )
    .unwrap();

    let json = stdout_json(&folio(&["optimize", "--input", input.to_str().unwrap()]));
    let weights: Vec<f64> = serde_json::from_value(json["result"]["optimal_weights"].clone()).unwrap();
    assert_eq!(weights.len(), 2);
    assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    assert!(weights[0] > weights[1]);
    assert_eq!(json["result"]["success"], Value::Bool(true));
}

#[test]
fn test_config_file_sets_risk_free_rate() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.json");
    fs::write(
        &input,
        r#"{"annualized_returns": [0.08, 0.08], "covariance_matrix": [[0.04, 0.0], [0.0, 0.04]]}"#,
    )
    .unwrap();
    let config = dir.path().join("folio.yaml");
    fs::write(&config, "risk_free_rate: 0.0\n").unwrap();

    let json = stdout_json(&folio(&[
        "optimize",
        "--input",
        input.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]));
    assert_eq!(json["assumptions"]["risk_free_rate"], serde_json::json!(0.0));
}

#[test]
fn test_stats_from_price_csv() {
    let dir = tempfile::tempdir().unwrap();
    let prices = dir.path().join("prices.csv");
    fs::write(
        &prices,
        "date,A,B\n2024-01-02,100,50\n2024-01-03,101,49.5\n2024-01-04,,50.5\n2024-01-05,103,50\n",
    )
    .unwrap();

    let json = stdout_json(&folio(&["stats", "--prices", prices.to_str().unwrap()]));
    assert_eq!(json["result"]["observations"], serde_json::json!(3));
    assert_eq!(json["result"]["covariance_matrix"].as_array().unwrap().len(), 2);
}

#[test]
fn test_risk_from_inline_returns() {
    let json = stdout_json(&folio(&[
        "risk",
        "--returns",
        "0.01,-0.02,0.015,-0.005,0.02",
        "--confidence",
        "0.5",
    ]));
    // floor(0.5 * 5) = 2 -> third smallest return
    assert_eq!(json["result"]["value_at_risk"], serde_json::json!(0.01));
}

#[test]
fn test_risk_reports_sharpe_ratio() {
    let json = stdout_json(&folio(&[
        "risk",
        "--returns",
        "0.0,0.01,0.02",
        "--periods-per-year",
        "100",
        "--risk-free-rate",
        "0.52",
    ]));
    let sharpe = json["result"]["sharpe_ratio"].as_f64().unwrap();
    assert!((sharpe - 4.8).abs() < 1e-9, "sharpe {}", sharpe);
}

#[test]
fn test_forecast_from_inline_returns() {
    let returns: Vec<String> = (0..60)
        .map(|t| format!("{}", 0.01 * (0.3 * t as f64).sin()))
        .collect();
    let json = stdout_json(&folio(&[
        "forecast",
        "--returns",
        &returns.join(","),
        "--lag",
        "2",
        "--horizon",
        "3",
    ]));
    let predictions: Vec<f64> = serde_json::from_value(json["result"]["predictions"].clone()).unwrap();
    assert_eq!(predictions.len(), 3);
    assert!((predictions[0] - 0.01 * (0.3 * 60.0_f64).sin()).abs() < 1e-8);
    assert_eq!(json["result"]["test_size"], serde_json::json!(12));
}

#[test]
fn test_forecast_short_series_fails() {
    let output = folio(&["forecast", "--returns", "0.01,0.02,0.03", "--lag", "5"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Insufficient data"));
}

#[test]
fn test_optimize_from_piped_stdin() {
    let json = stdout_json(&folio_with_stdin(
        &["optimize"],
        r#"{"annualized_returns": [0.08, 0.08], "covariance_matrix": [[0.04, 0.0], [0.0, 0.04]]}"#,
    ));
    assert_eq!(json["result"]["success"], Value::Bool(true));
}

#[test]
fn test_piped_stdin_must_be_json() {
    let output = folio_with_stdin(&["forecast"], "returns: [0.01]");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("stdin is not a JSON payload"));
}

#[test]
fn test_missing_input_file_exits_with_error() {
    let output = folio(&["optimize", "--input", "/no/such/input.json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("File not found"));
}

#[test]
fn test_minimal_output_prints_weights() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.json");
    fs::write(
        &input,
        r#"{"annualized_returns": [0.08, 0.08], "covariance_matrix": [[0.04, 0.0], [0.0, 0.04]]}"#,
    )
    .unwrap();

    let output = folio(&["optimize", "--input", input.to_str().unwrap(), "--output", "minimal"]);
    assert!(output.status.success());
    let line = String::from_utf8_lossy(&output.stdout);
    let weights: Vec<f64> = line
        .trim()
        .split(',')
        .map(|w| w.parse().unwrap())
        .collect();
    assert_eq!(weights.len(), 2);
    assert!((weights[0] - 0.5).abs() < 1e-6);
}
