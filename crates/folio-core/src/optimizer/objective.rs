use crate::optimizer::sharpe::sharpe_ratio;
use crate::optimizer::{CovarianceMatrix, WeightBand};
use crate::types::Rate;

/// Rebalancing friction `Σ |wᵢ - w₀ᵢ| · cᵢ`.
pub fn transaction_cost_penalty(weights: &[f64], initial_weights: &[f64], costs: &[f64]) -> f64 {
    weights
        .iter()
        .zip(initial_weights.iter())
        .zip(costs.iter())
        .map(|((w, w0), c)| (w - w0).abs() * c)
        .sum()
}

/// Value minimized by the driver: `-(sharpe - cost_penalty)`.
///
/// Weights are clamped into `band` before anything else, so both the Sharpe
/// ratio and the cost penalty see the clamped vector. The penalty is then
/// clamped into `[0, 1]`.
pub fn objective_for_minimization(
    weights: &[f64],
    returns: &[f64],
    covariance: &CovarianceMatrix,
    initial_weights: &[f64],
    transaction_costs: &[f64],
    risk_free_rate: Rate,
    band: WeightBand,
) -> f64 {
    let clamped = band.clamp_all(weights);
    let sharpe = sharpe_ratio(&clamped, returns, covariance, risk_free_rate);
    let penalty = transaction_cost_penalty(&clamped, initial_weights, transaction_costs).clamp(0.0, 1.0);
    -(sharpe - penalty)
}
