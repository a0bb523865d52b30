use clap::Args;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::debug;

use folio_core::market_data::{self, PriceSource, TRADING_DAYS};
use folio_core::optimizer;
use folio_core::risk::{self, RiskReportInput};
use folio_core::types::with_metadata;

use crate::input::config;
use crate::input::prices::CsvPriceSource;

/// Arguments for the price-history-to-risk pipeline
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Path to price CSV (`date,<asset>,...`)
    #[arg(long)]
    pub prices: String,

    /// Proportional transaction cost applied to every asset
    #[arg(long)]
    pub transaction_cost: Option<f64>,

    /// Comma-separated current weights (equal weights when omitted)
    #[arg(long, value_delimiter = ',')]
    pub initial_weights: Option<Vec<f64>>,

    /// Confidence level for VaR/CVaR of the optimized portfolio
    #[arg(long, default_value = "0.95")]
    pub confidence: f64,

    /// Optimizer settings file (YAML or JSON)
    #[arg(long)]
    pub config: Option<String>,

    /// Risk-free rate (annualised), overrides the config file
    #[arg(long, allow_hyphen_values = true)]
    pub risk_free_rate: Option<f64>,

    /// Trading days per year used to annualise
    #[arg(long, default_value_t = TRADING_DAYS)]
    pub trading_days: u32,
}

#[derive(Debug, Serialize)]
struct AnalysisReport {
    assets: Vec<String>,
    observations: usize,
    annualized_returns: Vec<f64>,
    annualized_volatility: Vec<f64>,
    asset_sharpe_ratios: Vec<Option<f64>>,
    optimal_weights: Vec<f64>,
    sharpe_ratio: f64,
    expected_return: f64,
    volatility: f64,
    transaction_cost_penalty: f64,
    iterations: u32,
    confidence_level: f64,
    value_at_risk: f64,
    conditional_value_at_risk: f64,
    max_drawdown: f64,
    omega_ratio: Option<f64>,
}

pub fn run_analyze(args: AnalyzeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let history = CsvPriceSource::open(&args.prices)?.load()?;
    let config = config::with_overrides(
        config::load_config(args.config.as_deref())?,
        args.risk_free_rate,
    );

    let stats = market_data::calculate_asset_statistics(&history, args.trading_days, config.risk_free_rate)?;
    let mut warnings = stats.warnings;
    let stats = stats.result;

    let mut opt_input = stats.to_optimization_input();
    if let Some(cost) = args.transaction_cost {
        opt_input = opt_input.with_transaction_costs(vec![cost; stats.assets.len()]);
    }
    if let Some(weights) = args.initial_weights {
        opt_input = opt_input.with_initial_weights(weights);
    }
    let optimized = optimizer::optimize_portfolio(&opt_input, &config)?;
    warnings.extend(optimized.warnings);
    let optimized = optimized.result;
    debug!(
        sharpe_ratio = optimized.sharpe_ratio,
        iterations = optimized.iterations,
        "optimized weights from price history"
    );

    let daily = market_data::daily_returns(&history)?;
    let series = market_data::portfolio_returns(&daily, &optimized.optimal_weights)?;
    let report = risk::calculate_risk_report(&RiskReportInput {
        returns: series,
        confidence_level: args.confidence,
        omega_threshold: 0.0,
        risk_free_rate: config.risk_free_rate,
        periods_per_year: args.trading_days,
    })?;
    warnings.extend(report.warnings);
    let report = report.result;

    let analysis = AnalysisReport {
        assets: stats.assets,
        observations: stats.observations,
        annualized_returns: stats.annualized_returns.as_slice().to_vec(),
        annualized_volatility: stats.annualized_volatility,
        asset_sharpe_ratios: stats.sharpe_ratios,
        optimal_weights: optimized.optimal_weights,
        sharpe_ratio: optimized.sharpe_ratio,
        expected_return: optimized.expected_return,
        volatility: optimized.volatility,
        transaction_cost_penalty: optimized.transaction_cost_penalty,
        iterations: optimized.iterations,
        confidence_level: report.confidence_level,
        value_at_risk: report.value_at_risk,
        conditional_value_at_risk: report.conditional_value_at_risk,
        max_drawdown: report.max_drawdown,
        omega_ratio: report.omega_ratio,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let output = with_metadata(
        "Historical Statistics, Cost-Penalized Max Sharpe, Historical Risk",
        &json!({
            "prices": args.prices,
            "trading_days": args.trading_days,
            "transaction_cost": args.transaction_cost,
            "risk_free_rate": config.risk_free_rate,
            "returns": "simple daily, forward-filled",
        }),
        warnings,
        elapsed,
        analysis,
    );
    Ok(serde_json::to_value(output)?)
}
