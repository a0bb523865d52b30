use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::distribution::Uniform;
use std::time::Instant;
use tracing::debug;

use crate::error::FolioError;
use crate::optimizer::{
    portfolio_return, portfolio_volatility, validate_inputs, AssetReturns, CovarianceMatrix,
};
use crate::types::{with_metadata, ComputationOutput, Rate};
use crate::FolioResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for sampling random long-only portfolios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomPortfolioInput {
    #[serde(default)]
    pub asset_names: Vec<String>,
    pub annualized_returns: AssetReturns,
    pub covariance_matrix: CovarianceMatrix,
    /// Number of portfolios (minimum 100, default 10 000).
    #[serde(default = "default_num_simulations")]
    pub num_simulations: u32,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: Rate,
    /// When set, each portfolio sees returns scaled by `1 + U(-s, s)` per
    /// asset.
    #[serde(default)]
    pub shock_factor: Option<f64>,
    /// Optional seed for reproducibility.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_num_simulations() -> u32 {
    10_000
}

fn default_risk_free_rate() -> Rate {
    0.02
}

/// One sampled portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedPortfolio {
    pub weights: Vec<f64>,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomPortfolioOutput {
    pub num_simulations: u32,
    /// Per-portfolio expected return, volatility and Sharpe ratio, in
    /// sampling order.
    pub returns: Vec<f64>,
    pub volatilities: Vec<f64>,
    pub sharpe_ratios: Vec<f64>,
    pub max_sharpe: SimulatedPortfolio,
    pub min_sharpe: SimulatedPortfolio,
    pub min_volatility: SimulatedPortfolio,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Sample random fully invested long-only portfolios and score each one.
pub fn simulate_random_portfolios(
    input: &RandomPortfolioInput,
) -> FolioResult<ComputationOutput<RandomPortfolioOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate(input)?;

    let n = input.annualized_returns.len();
    let mu = input.annualized_returns.as_slice();
    let sigma = &input.covariance_matrix;
    let shock = match input.shock_factor {
        Some(s) if s > 0.0 => Some(Uniform::new(-s, s).map_err(|e| {
            FolioError::invalid("shock_factor", format!("Invalid shock range: {e}"))
        })?),
        _ => None,
    };

    let mut rng = match input.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let sims = input.num_simulations as usize;
    let mut returns = Vec::with_capacity(sims);
    let mut volatilities = Vec::with_capacity(sims);
    let mut sharpe_ratios = Vec::with_capacity(sims);
    let mut max_sharpe: Option<SimulatedPortfolio> = None;
    let mut min_sharpe: Option<SimulatedPortfolio> = None;
    let mut min_volatility: Option<SimulatedPortfolio> = None;
    let mut degenerate = 0u32;

    for _ in 0..sims {
        let weights = random_weights(&mut rng, n);
        let shocked: Vec<f64> = match &shock {
            Some(dist) => mu.iter().map(|r| r * (1.0 + rng.sample(dist))).collect(),
            None => mu.to_vec(),
        };

        let ret = portfolio_return(&weights, &shocked);
        let vol = portfolio_volatility(&weights, sigma);
        let sharpe = (ret - input.risk_free_rate) / vol;
        returns.push(ret);
        volatilities.push(vol);
        sharpe_ratios.push(sharpe);

        if !sharpe.is_finite() {
            degenerate += 1;
            continue;
        }
        let candidate = SimulatedPortfolio {
            weights,
            expected_return: ret,
            volatility: vol,
            sharpe_ratio: sharpe,
        };
        if max_sharpe.as_ref().is_none_or(|b| sharpe > b.sharpe_ratio) {
            max_sharpe = Some(candidate.clone());
        }
        if min_sharpe.as_ref().is_none_or(|b| sharpe < b.sharpe_ratio) {
            min_sharpe = Some(candidate.clone());
        }
        if min_volatility.as_ref().is_none_or(|b| vol < b.volatility) {
            min_volatility = Some(candidate);
        }
    }

    let (Some(max_sharpe), Some(min_sharpe), Some(min_volatility)) = (max_sharpe, min_sharpe, min_volatility)
    else {
        return Err(FolioError::DivisionByZero {
            context: "every sampled portfolio has zero volatility".into(),
        });
    };
    if degenerate > 0 {
        warnings.push(format!(
            "{degenerate} of {} portfolios had an undefined Sharpe ratio",
            input.num_simulations
        ));
    }

    debug!(
        simulations = sims,
        best_sharpe = max_sharpe.sharpe_ratio,
        "random portfolio simulation finished"
    );

    let output = RandomPortfolioOutput {
        num_simulations: input.num_simulations,
        returns,
        volatilities,
        sharpe_ratios,
        max_sharpe,
        min_sharpe,
        min_volatility,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Random Portfolio Monte Carlo",
        &serde_json::json!({
            "num_simulations": input.num_simulations,
            "seed": input.seed,
            "risk_free_rate": input.risk_free_rate,
            "shock_factor": input.shock_factor,
            "weights": "uniform draws normalized to sum 1",
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn random_weights(rng: &mut StdRng, n: usize) -> Vec<f64> {
    let raw: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
    let total: f64 = raw.iter().sum();
    if total > 0.0 {
        raw.iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / n as f64; n]
    }
}

fn validate(input: &RandomPortfolioInput) -> FolioResult<()> {
    if input.num_simulations < 100 {
        return Err(FolioError::invalid("num_simulations", "Must be at least 100"));
    }
    let n = input.annualized_returns.len();
    if n == 0 {
        return Err(FolioError::invalid("annualized_returns", "At least one asset required"));
    }
    validate_inputs(input.annualized_returns.as_slice(), &input.covariance_matrix, None, None)?;
    if input.covariance_matrix.dim() != n {
        return Err(FolioError::invalid(
            "covariance_matrix",
            format!("Expected {}x{} matrix", n, n),
        ));
    }
    if let Some(s) = input.shock_factor {
        if !s.is_finite() || s < 0.0 {
            return Err(FolioError::invalid("shock_factor", "Must be a non-negative number"));
        }
    }
    Ok(())
}
