use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use std::time::Instant;
use tracing::debug;

use crate::error::FolioError;
use crate::linalg::{cholesky, dot, mat_vec_multiply};
use crate::optimizer::{validate_inputs, CovarianceMatrix};
use crate::risk::{conditional_value_at_risk, value_at_risk};
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::FolioResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for correlated portfolio value paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePathInput {
    /// Mean daily return per asset.
    pub mean_daily_returns: Vec<f64>,
    /// Daily (not annualized) covariance of asset returns.
    pub daily_covariance: CovarianceMatrix,
    /// Portfolio weights; equal weights when omitted.
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
    /// Number of paths (minimum 100, default 1 000).
    #[serde(default = "default_num_simulations")]
    pub num_simulations: u32,
    /// Trading days per path (default 252).
    #[serde(default = "default_time_horizon")]
    pub time_horizon: u32,
    /// Starting portfolio value (default 10 000).
    #[serde(default = "default_initial_value")]
    pub initial_value: Money,
    /// Confidence level for VaR / CVaR of the path return (default 0.95).
    #[serde(default = "default_confidence")]
    pub confidence_level: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_num_simulations() -> u32 {
    1_000
}

fn default_time_horizon() -> u32 {
    252
}

fn default_initial_value() -> Money {
    dec!(10000)
}

fn default_confidence() -> f64 {
    0.95
}

/// Percentile summary of final portfolio values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuePercentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePathOutput {
    pub num_simulations: u32,
    pub time_horizon: u32,
    pub initial_value: f64,
    pub mean_final_value: f64,
    pub final_values: ValuePercentiles,
    /// Share of paths ending below the initial value.
    pub probability_of_loss: f64,
    /// VaR of the total path return at `confidence_level`.
    pub value_at_risk: f64,
    pub conditional_value_at_risk: f64,
    pub average_max_drawdown: f64,
    pub worst_max_drawdown: f64,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Simulate portfolio value paths from multivariate normal daily returns.
///
/// Each day draws `μ + L z` with `L` the Cholesky factor of the daily
/// covariance and `z` standard normal, then compounds the weighted return.
pub fn simulate_price_paths(
    input: &PricePathInput,
) -> FolioResult<ComputationOutput<PricePathOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let n = validate(input)?;
    let weights = input
        .weights
        .clone()
        .unwrap_or_else(|| vec![1.0 / n as f64; n]);
    let initial_value = input.initial_value.to_f64().ok_or_else(|| {
        FolioError::invalid("initial_value", "Value is not representable as f64")
    })?;

    let l = cholesky(input.daily_covariance.rows()).ok_or_else(|| {
        FolioError::invalid(
            "daily_covariance",
            "Covariance matrix is not positive semidefinite",
        )
    })?;
    let normal = Normal::new(0.0, 1.0).map_err(|e| {
        FolioError::invalid("distribution", format!("Invalid Normal parameters: {e}"))
    })?;

    let mut rng = match input.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let sims = input.num_simulations as usize;
    let mut final_values = Vec::with_capacity(sims);
    let mut total_returns = Vec::with_capacity(sims);
    let mut drawdowns = Vec::with_capacity(sims);
    let mut z = vec![0.0; n];

    for _ in 0..sims {
        let mut value = initial_value;
        let mut peak = initial_value;
        let mut worst = 0.0_f64;
        for _ in 0..input.time_horizon {
            for zi in z.iter_mut() {
                *zi = rng.sample(normal);
            }
            let shocks = mat_vec_multiply(&l, &z);
            let daily: Vec<f64> = input
                .mean_daily_returns
                .iter()
                .zip(shocks.iter())
                .map(|(m, s)| m + s)
                .collect();
            value *= 1.0 + dot(&weights, &daily);
            peak = peak.max(value);
            if peak > 0.0 {
                worst = worst.min(value / peak - 1.0);
            }
        }
        final_values.push(value);
        total_returns.push(value / initial_value - 1.0);
        drawdowns.push(worst);
    }

    let losses = total_returns.iter().filter(|r| **r < 0.0).count();
    let var = value_at_risk(&total_returns, input.confidence_level)?;
    let cvar = conditional_value_at_risk(&total_returns, input.confidence_level)?;

    let mut sorted = final_values.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mean_final_value = sorted.iter().sum::<f64>() / sims as f64;
    if sorted[0] <= 0.0 {
        warnings.push("Some paths lost the entire portfolio value".into());
    }

    let output = PricePathOutput {
        num_simulations: input.num_simulations,
        time_horizon: input.time_horizon,
        initial_value,
        mean_final_value,
        final_values: ValuePercentiles {
            p5: percentile_sorted(&sorted, 5.0),
            p25: percentile_sorted(&sorted, 25.0),
            p50: percentile_sorted(&sorted, 50.0),
            p75: percentile_sorted(&sorted, 75.0),
            p95: percentile_sorted(&sorted, 95.0),
        },
        probability_of_loss: losses as f64 / sims as f64,
        value_at_risk: var,
        conditional_value_at_risk: cvar,
        average_max_drawdown: drawdowns.iter().sum::<f64>() / sims as f64,
        worst_max_drawdown: drawdowns.iter().copied().fold(0.0, f64::min),
    };

    debug!(
        simulations = sims,
        horizon = input.time_horizon,
        median = output.final_values.p50,
        "price path simulation finished"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Correlated Portfolio Path Monte Carlo (Cholesky)",
        &serde_json::json!({
            "num_simulations": input.num_simulations,
            "time_horizon": input.time_horizon,
            "initial_value": input.initial_value.to_string(),
            "seed": input.seed,
            "weights": if input.weights.is_some() { "supplied" } else { "equal" },
            "daily_returns": "multivariate normal",
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Percentile of a **sorted** slice using linear interpolation.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

fn validate(input: &PricePathInput) -> FolioResult<usize> {
    if input.num_simulations < 100 {
        return Err(FolioError::invalid("num_simulations", "Must be at least 100"));
    }
    if input.time_horizon == 0 {
        return Err(FolioError::invalid("time_horizon", "Must be at least 1"));
    }
    let n = input.mean_daily_returns.len();
    if n == 0 {
        return Err(FolioError::invalid("mean_daily_returns", "At least one asset required"));
    }
    validate_inputs(&input.mean_daily_returns, &input.daily_covariance, input.weights.as_deref(), None)?;
    if input.daily_covariance.dim() != n {
        return Err(FolioError::invalid(
            "daily_covariance",
            format!("Expected {}x{} matrix", n, n),
        ));
    }
    if let Some(ref w) = input.weights {
        if w.len() != n {
            return Err(FolioError::invalid(
                "weights",
                format!("Expected {} weights but got {}", n, w.len()),
            ));
        }
    }
    if input.initial_value <= Money::ZERO {
        return Err(FolioError::invalid("initial_value", "Must be positive"));
    }
    Ok(n)
}
