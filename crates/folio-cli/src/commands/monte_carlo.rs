use clap::Args;
use serde_json::Value;

use folio_core::monte_carlo::{self, PricePathInput, RandomPortfolioInput};

use crate::input;

/// Arguments for random portfolio sampling
#[derive(Args)]
pub struct SimulateArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// RNG seed, overrides the input file
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for correlated value path simulation
#[derive(Args)]
pub struct SimulatePathsArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// RNG seed, overrides the input file
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run_simulate(args: SimulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut mc_input: RandomPortfolioInput =
        input::read_payload(args.input.as_deref(), "random portfolio simulation")?;
    if args.seed.is_some() {
        mc_input.seed = args.seed;
    }
    let result = monte_carlo::simulate_random_portfolios(&mc_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_simulate_paths(args: SimulatePathsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut mc_input: PricePathInput =
        input::read_payload(args.input.as_deref(), "price path simulation")?;
    if args.seed.is_some() {
        mc_input.seed = args.seed;
    }
    let result = monte_carlo::simulate_price_paths(&mc_input)?;
    Ok(serde_json::to_value(result)?)
}
