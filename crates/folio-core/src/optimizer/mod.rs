//! Cost-aware maximum Sharpe ratio weight optimization.

pub mod driver;
pub mod objective;
pub mod sharpe;
pub mod types;
pub mod validation;

pub use driver::{optimize, optimize_portfolio, optimize_with};
pub use objective::{objective_for_minimization, transaction_cost_penalty};
pub use sharpe::{portfolio_return, portfolio_volatility, sharpe_ratio};
pub use types::{
    AssetReturns, CovarianceMatrix, OptimizationInput, OptimizationResult, OptimizerConfig,
    WeightBand, WeightBound,
};
pub use validation::{validate_input, validate_inputs};
