use serde_json::json;
use std::time::Instant;
use tracing::debug;

use crate::error::FolioError;
use crate::optimizer::objective::{objective_for_minimization, transaction_cost_penalty};
use crate::optimizer::sharpe::{portfolio_return, portfolio_volatility, sharpe_ratio};
use crate::optimizer::validation::validate_input;
use crate::optimizer::{
    CovarianceMatrix, OptimizationInput, OptimizationResult, OptimizerConfig, WeightBand,
    WeightBound,
};
use crate::solver::{ConstrainedMinimizer, Constraint, Problem, Sqp};
use crate::types::{with_metadata, ComputationOutput};
use crate::FolioResult;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Find the weights maximizing Sharpe ratio net of transaction costs.
///
/// Runs the validator, then the SQP solver over
/// [`objective_for_minimization`] with `Σw = 1` and the per-asset bounds
/// intersected with the weight band. Solver failure is returned as
/// [`FolioError::ConvergenceFailure`] carrying the solver's message; no
/// partial weights are ever returned.
pub fn optimize(
    input: &OptimizationInput,
    config: &OptimizerConfig,
) -> FolioResult<OptimizationResult> {
    optimize_with(input, config, &Sqp::new(config.solver_options()))
}

/// [`optimize`] against any [`ConstrainedMinimizer`].
pub fn optimize_with(
    input: &OptimizationInput,
    config: &OptimizerConfig,
    solver: &dyn ConstrainedMinimizer,
) -> FolioResult<OptimizationResult> {
    run(input, config, solver).map(|(result, _)| result)
}

/// [`optimize`] wrapped in the standard computation envelope.
pub fn optimize_portfolio(
    input: &OptimizationInput,
    config: &OptimizerConfig,
) -> FolioResult<ComputationOutput<OptimizationResult>> {
    let start = Instant::now();
    let solver = Sqp::new(config.solver_options());
    let (result, warnings) = run(input, config, &solver)?;

    let band = config.weight_band.effective_for(input.n_assets());
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Cost-Penalized Maximum Sharpe Ratio (SQP)",
        &json!({
            "n_assets": input.n_assets(),
            "risk_free_rate": config.risk_free_rate,
            "weight_band": [band.lower, band.upper],
            "initial_weights": if input.initial_weights.is_some() { "supplied" } else { "equal" },
            "transaction_costs": if input.transaction_costs.is_some() { "supplied" } else { "zero" },
            "constraint": "sum(weights) = 1",
            "max_iterations": config.max_iterations,
            "tolerance": config.tolerance,
        }),
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

fn run(
    input: &OptimizationInput,
    config: &OptimizerConfig,
    solver: &dyn ConstrainedMinimizer,
) -> FolioResult<(OptimizationResult, Vec<String>)> {
    validate_input(input, config)?;

    let n = input.n_assets();
    let returns = input.annualized_returns.as_slice();
    let sigma = &input.covariance_matrix;
    let rf = config.risk_free_rate;
    let initial = input.initial_weights_or_default();
    let costs = input.transaction_costs_or_default();
    let band = config.weight_band.effective_for(n);
    let (bounds, mut warnings) = solver_box(&input.bounds_or_default(), band);

    if band != config.weight_band {
        warnings.push(format!(
            "Weight band [{:.4}, {:.4}] cannot hold a fully invested portfolio of {} assets; using [{:.4}, {:.4}]",
            config.weight_band.lower, config.weight_band.upper, n, band.lower, band.upper
        ));
    }

    let start: Vec<f64> = initial
        .iter()
        .zip(bounds.iter())
        .map(|(w, (lo, hi))| w.max(*lo).min(*hi))
        .collect();
    ensure_volatility(&band.clamp_all(&start), sigma, "portfolio volatility at the starting weights")?;

    debug!(
        n_assets = n,
        band_lower = band.lower,
        band_upper = band.upper,
        risk_free_rate = rf,
        "optimizing portfolio weights"
    );

    let outcome = {
        let problem = Problem::new(|w: &[f64]| {
            objective_for_minimization(w, returns, sigma, &initial, &costs, rf, band)
        })
        .with_bounds(bounds)
        .with_constraint(
            Constraint::equality(|w: &[f64]| w.iter().sum::<f64>() - 1.0)
                .with_jacobian(|w| vec![1.0; w.len()]),
        );
        solver.minimize(&problem, &initial)
    };

    if !outcome.success {
        return Err(FolioError::ConvergenceFailure {
            iterations: outcome.iterations,
            message: outcome.message,
        });
    }
    if outcome.x.len() != n {
        return Err(FolioError::ConvergenceFailure {
            iterations: outcome.iterations,
            message: format!("Solver returned {} weights for {} assets", outcome.x.len(), n),
        });
    }

    // Final clip onto the band, same policy as inside the objective.
    let weights = band.clamp_all(&outcome.x);
    let moved = weights
        .iter()
        .zip(outcome.x.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0_f64, f64::max);
    if moved > config.tolerance {
        warnings.push(format!(
            "Final clip into [{:.4}, {:.4}] moved a weight by {:.6}",
            band.lower, band.upper, moved
        ));
    }
    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > 1e-6 {
        warnings.push(format!("Reported weights sum to {:.8}", total));
    }

    let volatility = ensure_volatility(&weights, sigma, "portfolio volatility at the optimal weights")?;
    let result = OptimizationResult {
        sharpe_ratio: sharpe_ratio(&weights, returns, sigma, rf),
        transaction_cost_penalty: transaction_cost_penalty(&weights, &initial, &costs),
        expected_return: portfolio_return(&weights, returns),
        volatility,
        optimal_weights: weights,
        success: true,
        message: outcome.message,
        iterations: outcome.iterations,
        function_evaluations: outcome.function_evaluations,
    };

    debug!(
        sharpe_ratio = result.sharpe_ratio,
        iterations = result.iterations,
        evaluations = result.function_evaluations,
        "portfolio optimization converged"
    );

    Ok((result, warnings))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Caller bounds intersected with the band. A bound that misses the band
/// is pinned to the nearest band edge. Whether the box admits a fully
/// invested portfolio is left to the solver.
fn solver_box(bounds: &[WeightBound], band: WeightBand) -> (Vec<(f64, f64)>, Vec<String>) {
    let mut warnings = Vec::new();
    let boxed = bounds
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let lo = band.clamp(b.low);
            let hi = band.clamp(b.high);
            if b.low > band.upper || b.high < band.lower {
                warnings.push(format!(
                    "bounds[{}] [{}, {}] lies outside the weight band [{}, {}]; pinned to {}",
                    i, b.low, b.high, band.lower, band.upper, lo
                ));
            }
            (lo, hi)
        })
        .collect();
    (boxed, warnings)
}

fn ensure_volatility(weights: &[f64], sigma: &CovarianceMatrix, context: &str) -> FolioResult<f64> {
    let vol = portfolio_volatility(weights, sigma);
    if vol > 0.0 && vol.is_finite() {
        Ok(vol)
    } else {
        Err(FolioError::DivisionByZero {
            context: context.into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
