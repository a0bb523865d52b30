use clap::Args;
use serde_json::Value;

use folio_core::forecast::{self, ForecastInput};
use folio_core::market_data::{self, PriceSource};

use crate::input;
use crate::input::prices::CsvPriceSource;

/// Arguments for the lagged linear return forecast
#[derive(Args)]
pub struct ForecastArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated periodic returns, oldest first
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub returns: Option<Vec<f64>>,

    /// Path to price CSV; forecasts the daily returns of `--asset`
    #[arg(long, requires = "asset")]
    pub prices: Option<String>,

    /// Asset column of the price CSV
    #[arg(long)]
    pub asset: Option<String>,

    /// Number of lagged returns used as regressors
    #[arg(long)]
    pub lag: Option<usize>,

    /// Periods to forecast
    #[arg(long)]
    pub horizon: Option<usize>,

    /// Share of samples held out to score the model
    #[arg(long)]
    pub test_fraction: Option<f64>,
}

pub fn run_forecast(args: ForecastArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut fc_input: ForecastInput = match (args.returns, args.prices) {
        (Some(returns), _) => serde_json::from_value(serde_json::json!({ "returns": returns }))?,
        (None, Some(prices)) => {
            let returns = asset_returns(&prices, args.asset.as_deref().unwrap_or_default())?;
            serde_json::from_value(serde_json::json!({ "returns": returns }))?
        }
        (None, None) => input::read_payload(
            args.input.as_deref(),
            "return forecasting (or use --returns / --prices)",
        )?,
    };
    if let Some(lag) = args.lag {
        fc_input.lag = lag;
    }
    if let Some(horizon) = args.horizon {
        fc_input.horizon = horizon;
    }
    if let Some(fraction) = args.test_fraction {
        fc_input.test_fraction = fraction;
    }

    let result = forecast::forecast_returns(&fc_input)?;
    Ok(serde_json::to_value(result)?)
}

fn asset_returns(path: &str, asset: &str) -> Result<Vec<f64>, Box<dyn std::error::Error>> {
    let history = CsvPriceSource::open(path)?.load()?;
    let daily = market_data::daily_returns(&history)?;
    let column = daily
        .assets
        .iter()
        .position(|a| a == asset)
        .ok_or_else(|| format!("Asset '{}' not found in {}", asset, path))?;
    Ok(daily.column(column))
}
