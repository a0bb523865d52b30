use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::FolioError;
use crate::risk::metrics::{max_drawdown, mean_and_std};
use crate::types::{with_metadata, ComputationOutput};
use crate::FolioResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a shock is applied to an asset's historical returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShockMode {
    /// `r * (1 + shock)`
    #[default]
    Multiplicative,
    /// `r + shock`
    Additive,
}

/// Named set of per-asset shocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressScenario {
    pub name: String,
    pub shocks: BTreeMap<String, f64>,
    #[serde(default)]
    pub mode: ShockMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestInput {
    pub assets: Vec<String>,
    /// Historical returns, one row per period, one column per asset.
    pub returns: Vec<Vec<f64>>,
    pub weights: Vec<f64>,
    pub scenarios: Vec<StressScenario>,
}

/// Portfolio behaviour under one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressResult {
    pub scenario: String,
    pub mode: ShockMode,
    /// Mean stressed portfolio return per period.
    pub stressed_return: f64,
    /// Sample standard deviation of stressed portfolio returns.
    pub stressed_risk: f64,
    pub stressed_max_drawdown: f64,
    /// Shocked assets missing from the universe.
    pub ignored_assets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestOutput {
    pub baseline_return: f64,
    pub baseline_risk: f64,
    pub baseline_max_drawdown: f64,
    pub scenarios: Vec<StressResult>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Apply one scenario to the return table and measure the weighted
/// portfolio. Shocks naming unknown assets are skipped and reported.
pub fn stress_test(
    assets: &[String],
    returns: &[Vec<f64>],
    weights: &[f64],
    scenario: &StressScenario,
) -> FolioResult<StressResult> {
    validate_table(assets, returns, weights)?;

    let mut shocked = returns.to_vec();
    let mut ignored_assets = Vec::new();
    for (asset, shock) in &scenario.shocks {
        match assets.iter().position(|a| a == asset) {
            Some(j) => {
                for row in shocked.iter_mut() {
                    row[j] = match scenario.mode {
                        ShockMode::Multiplicative => row[j] * (1.0 + shock),
                        ShockMode::Additive => row[j] + shock,
                    };
                }
            }
            None => ignored_assets.push(asset.clone()),
        }
    }

    let series = weighted(&shocked, weights);
    let (stressed_return, stressed_risk) = mean_and_std(&series);
    Ok(StressResult {
        scenario: scenario.name.clone(),
        mode: scenario.mode,
        stressed_return,
        stressed_risk,
        stressed_max_drawdown: max_drawdown(&series)?,
        ignored_assets,
    })
}

/// Baseline plus every scenario, in the standard envelope.
pub fn run_stress_tests(input: &StressTestInput) -> FolioResult<ComputationOutput<StressTestOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_table(&input.assets, &input.returns, &input.weights)?;
    if input.scenarios.is_empty() {
        return Err(FolioError::InsufficientData(
            "At least one stress scenario required".into(),
        ));
    }

    let baseline = weighted(&input.returns, &input.weights);
    let (baseline_return, baseline_risk) = mean_and_std(&baseline);
    let baseline_max_drawdown = max_drawdown(&baseline)?;

    let mut scenarios = Vec::with_capacity(input.scenarios.len());
    for scenario in &input.scenarios {
        let result = stress_test(&input.assets, &input.returns, &input.weights, scenario)?;
        if !result.ignored_assets.is_empty() {
            warnings.push(format!(
                "Scenario '{}': unknown assets ignored: {}",
                scenario.name,
                result.ignored_assets.join(", ")
            ));
        }
        scenarios.push(result);
    }

    let output = StressTestOutput {
        baseline_return,
        baseline_risk,
        baseline_max_drawdown,
        scenarios,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Historical Return Stress Test",
        &serde_json::json!({
            "assets": input.assets,
            "periods": input.returns.len(),
            "scenarios": input.scenarios.iter().map(|s| &s.name).collect::<Vec<_>>(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn weighted(returns: &[Vec<f64>], weights: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .map(|row| row.iter().zip(weights.iter()).map(|(r, w)| r * w).sum())
        .collect()
}

fn validate_table(assets: &[String], returns: &[Vec<f64>], weights: &[f64]) -> FolioResult<()> {
    if assets.is_empty() {
        return Err(FolioError::invalid("assets", "At least one asset required"));
    }
    if returns.is_empty() {
        return Err(FolioError::InsufficientData(
            "At least one return period required".into(),
        ));
    }
    if weights.len() != assets.len() {
        return Err(FolioError::invalid(
            "weights",
            format!("Expected {} weights but got {}", assets.len(), weights.len()),
        ));
    }
    for (t, row) in returns.iter().enumerate() {
        if row.len() != assets.len() {
            return Err(FolioError::invalid(
                format!("returns[{}]", t),
                format!("Expected {} columns but got {}", assets.len(), row.len()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assets() -> Vec<String> {
        vec!["AAA".into(), "BBB".into()]
    }

    fn table() -> Vec<Vec<f64>> {
        vec![vec![0.01, 0.02], vec![-0.02, 0.01], vec![0.03, -0.01]]
    }

    fn scenario(mode: ShockMode) -> StressScenario {
        StressScenario {
            name: "crash".into(),
            shocks: BTreeMap::from([("AAA".to_string(), -0.5), ("ZZZ".to_string(), 1.0)]),
            mode,
        }
    }

    #[test]
    fn test_multiplicative_shock() {
        let r = stress_test(&assets(), &table(), &[1.0, 0.0], &scenario(ShockMode::Multiplicative)).unwrap();
        // AAA halves: 0.005, -0.01, 0.015
        assert!((r.stressed_return - 0.01 / 3.0).abs() < 1e-12);
        assert_eq!(r.ignored_assets, vec!["ZZZ".to_string()]);
    }

    #[test]
    fn test_additive_shock() {
        let r = stress_test(&assets(), &table(), &[0.5, 0.5], &scenario(ShockMode::Additive)).unwrap();
        // AAA: -0.49, -0.52, -0.47 ; portfolio = 0.5 * (AAA + BBB)
        let expected = 0.5 * ((-0.49 - 0.52 - 0.47) + (0.02 + 0.01 - 0.01)) / 3.0;
        assert!((r.stressed_return - expected).abs() < 1e-12);
        assert!(r.stressed_max_drawdown < -0.4);
    }

    #[test]
    fn test_envelope_warns_on_unknown_asset() {
        let input = StressTestInput {
            assets: assets(),
            returns: table(),
            weights: vec![0.5, 0.5],
            scenarios: vec![scenario(ShockMode::Multiplicative)],
        };
        let out = run_stress_tests(&input).unwrap();
        assert_eq!(out.result.scenarios.len(), 1);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.result.baseline_return > out.result.scenarios[0].stressed_return - 1.0);
    }

    #[test]
    fn test_weight_mismatch_rejected() {
        let err = stress_test(&assets(), &table(), &[1.0], &scenario(ShockMode::Additive)).unwrap_err();
        assert!(matches!(err, FolioError::InvalidInput { .. }));
    }

    #[test]
    fn test_mode_deserializes_snake_case() {
        let s: StressScenario =
            serde_json::from_str(r#"{"name": "x", "shocks": {"AAA": 0.1}, "mode": "additive"}"#).unwrap();
        assert_eq!(s.mode, ShockMode::Additive);
        let d: StressScenario = serde_json::from_str(r#"{"name": "y", "shocks": {}}"#).unwrap();
        assert_eq!(d.mode, ShockMode::Multiplicative);
    }
}
