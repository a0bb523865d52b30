//! Price histories and the return statistics the optimizer consumes.

pub mod prices;
pub mod statistics;

pub use prices::{PriceHistory, PriceObservation, PriceSource};
pub use statistics::{
    annualized_returns, calculate_asset_statistics, covariance_matrix, daily_returns, log_returns,
    portfolio_returns, AssetStatistics, ReturnSeries, TRADING_DAYS,
};
