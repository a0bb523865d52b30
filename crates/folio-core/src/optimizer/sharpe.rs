use crate::linalg::{dot, quadratic_form};
use crate::optimizer::CovarianceMatrix;
use crate::types::Rate;

/// Expected portfolio return `w·μ`.
pub fn portfolio_return(weights: &[f64], returns: &[f64]) -> f64 {
    dot(weights, returns)
}

/// Portfolio volatility `sqrt(wᵀΣw)`.
pub fn portfolio_volatility(weights: &[f64], covariance: &CovarianceMatrix) -> f64 {
    quadratic_form(covariance.rows(), weights).sqrt()
}

/// Sharpe ratio `(w·μ - rf) / sqrt(wᵀΣw)`.
///
/// Plain IEEE arithmetic: a zero volatility yields ±inf (or NaN when the
/// excess return is also zero). Callers that need a guard check
/// [`portfolio_volatility`] first.
pub fn sharpe_ratio(
    weights: &[f64],
    returns: &[f64],
    covariance: &CovarianceMatrix,
    risk_free_rate: Rate,
) -> f64 {
    (portfolio_return(weights, returns) - risk_free_rate) / portfolio_volatility(weights, covariance)
}
