//! Seeded Monte Carlo: random portfolio sampling and correlated value paths.

pub mod paths;
pub mod portfolios;

pub use paths::{simulate_price_paths, PricePathInput, PricePathOutput, ValuePercentiles};
pub use portfolios::{
    simulate_random_portfolios, RandomPortfolioInput, RandomPortfolioOutput, SimulatedPortfolio,
};
