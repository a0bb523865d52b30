use clap::Args;
use serde_json::Value;

use folio_core::risk::{self, RiskReportInput, StressTestInput};

use crate::input;

/// Arguments for historical risk metrics
#[derive(Args)]
pub struct RiskArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated periodic returns (e.g. "0.01,-0.02,0.005")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub returns: Option<Vec<f64>>,

    /// Confidence level for VaR/CVaR (e.g. 0.95 for 95%)
    #[arg(long, default_value = "0.95")]
    pub confidence: f64,

    /// Per-period threshold for the omega ratio
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pub omega_threshold: f64,

    /// Risk-free rate (annualised) for the Sharpe ratio
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pub risk_free_rate: f64,

    /// Periods per year for the annualised figures
    #[arg(long, default_value = "252")]
    pub periods_per_year: u32,
}

/// Arguments for scenario stress tests
#[derive(Args)]
pub struct StressTestArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_risk(args: RiskArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let risk_input = match args.returns {
        Some(returns) => RiskReportInput {
            returns,
            confidence_level: args.confidence,
            omega_threshold: args.omega_threshold,
            risk_free_rate: args.risk_free_rate,
            periods_per_year: args.periods_per_year,
        },
        None => input::read_payload(args.input.as_deref(), "risk metrics (or use --returns)")?,
    };
    let result = risk::calculate_risk_report(&risk_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_stress_test(args: StressTestArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let stress_input: StressTestInput = input::read_payload(args.input.as_deref(), "stress testing")?;
    let result = risk::run_stress_tests(&stress_input)?;
    Ok(serde_json::to_value(result)?)
}
