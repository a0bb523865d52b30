mod commands;
mod input;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::analyze::AnalyzeArgs;
use commands::forecast::ForecastArgs;
use commands::monte_carlo::{SimulateArgs, SimulatePathsArgs};
use commands::optimize::OptimizeArgs;
use commands::risk::{RiskArgs, StressTestArgs};
use commands::statistics::StatsArgs;

/// Cost-aware portfolio optimization and risk analysis
#[derive(Parser)]
#[command(
    name = "folio",
    version,
    about = "Cost-aware portfolio optimization and risk analysis",
    long_about = "A CLI for maximizing portfolio Sharpe ratio net of transaction costs \
                  under fully-invested, bounded weights. Also derives return statistics \
                  from price histories, reports historical risk, runs stress scenarios \
                  and Monte Carlo simulations, and forecasts returns from their lags."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Maximize Sharpe ratio net of transaction costs
    Optimize(OptimizeArgs),
    /// Annualized returns and covariance from a price CSV
    Stats(StatsArgs),
    /// Price CSV to optimal weights and the optimized portfolio's risk
    Analyze(AnalyzeArgs),
    /// Historical VaR, CVaR, drawdown and omega of a return series
    Risk(RiskArgs),
    /// Apply shock scenarios to a historical return table
    StressTest(StressTestArgs),
    /// Sample random long-only portfolios
    Simulate(SimulateArgs),
    /// Simulate correlated portfolio value paths
    SimulatePaths(SimulatePathsArgs),
    /// Forecast returns from their own lags
    Forecast(ForecastArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Optimize(args) => commands::optimize::run_optimize(args),
        Commands::Stats(args) => commands::statistics::run_stats(args),
        Commands::Analyze(args) => commands::analyze::run_analyze(args),
        Commands::Risk(args) => commands::risk::run_risk(args),
        Commands::StressTest(args) => commands::risk::run_stress_test(args),
        Commands::Simulate(args) => commands::monte_carlo::run_simulate(args),
        Commands::SimulatePaths(args) => commands::monte_carlo::run_simulate_paths(args),
        Commands::Forecast(args) => commands::forecast::run_forecast(args),
        Commands::Version => {
            println!("folio {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
