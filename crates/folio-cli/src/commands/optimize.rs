use clap::Args;
use serde_json::Value;

use folio_core::optimizer::{self, OptimizationInput};

use crate::input;
use crate::input::config;

/// Arguments for cost-penalized Sharpe maximization
#[derive(Args)]
pub struct OptimizeArgs {
    /// Path to JSON input file (returns, covariance, optional weights, costs, bounds)
    #[arg(long)]
    pub input: Option<String>,

    /// Optimizer settings file (YAML or JSON)
    #[arg(long)]
    pub config: Option<String>,

    /// Risk-free rate (annualised), overrides the config file
    #[arg(long, allow_hyphen_values = true)]
    pub risk_free_rate: Option<f64>,
}

pub fn run_optimize(args: OptimizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let opt_input: OptimizationInput =
        input::read_payload(args.input.as_deref(), "portfolio optimization")?;
    let config = config::with_overrides(
        config::load_config(args.config.as_deref())?,
        args.risk_free_rate,
    );
    let result = optimizer::optimize_portfolio(&opt_input, &config)?;
    Ok(serde_json::to_value(result)?)
}
