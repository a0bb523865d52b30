use clap::Args;
use serde_json::Value;

use folio_core::market_data::{self, PriceSource, TRADING_DAYS};

use crate::input::prices::CsvPriceSource;

/// Arguments for return statistics of a price history
#[derive(Args)]
pub struct StatsArgs {
    /// Path to price CSV (`date,<asset>,...`)
    #[arg(long)]
    pub prices: String,

    /// Trading days per year used to annualise
    #[arg(long, default_value_t = TRADING_DAYS)]
    pub trading_days: u32,

    /// Risk-free rate (annualised) for the per-asset Sharpe ratios
    #[arg(long, default_value = "0.02", allow_hyphen_values = true)]
    pub risk_free_rate: f64,
}

pub fn run_stats(args: StatsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let history = CsvPriceSource::open(&args.prices)?.load()?;
    let result = market_data::calculate_asset_statistics(&history, args.trading_days, args.risk_free_rate)?;
    Ok(serde_json::to_value(result)?)
}
