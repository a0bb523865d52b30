//! Historical risk metrics and scenario stress tests.

pub mod metrics;
pub mod stress;

pub use metrics::{
    annualized_sharpe, calculate_risk_report, conditional_value_at_risk, max_drawdown, mean_and_std, omega_ratio,
    value_at_risk, RiskReport, RiskReportInput,
};
pub use stress::{
    run_stress_tests, stress_test, ShockMode, StressResult, StressScenario, StressTestInput,
    StressTestOutput,
};
