use chrono::{Duration, NaiveDate};
use folio_core::market_data::{
    calculate_asset_statistics, daily_returns, portfolio_returns, PriceHistory, PriceObservation,
    PriceSource, TRADING_DAYS,
};
use folio_core::optimizer::{optimize, OptimizerConfig};
use folio_core::risk::{calculate_risk_report, run_stress_tests, RiskReportInput, StressScenario, StressTestInput};
use folio_core::FolioError;
use pretty_assertions::assert_eq;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const ASSETS: [&str; 4] = ["EQ_US", "EQ_EU", "BOND", "GOLD"];

fn price(value: f64) -> Option<Decimal> {
    Some(Decimal::from_f64(value).unwrap().round_dp(4))
}

/// Ninety business-day-like observations with distinct drift and wiggle per
/// asset so the covariance is well conditioned.
fn history() -> PriceHistory {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let observations = (0..90)
        .map(|t| {
            let x = t as f64;
            PriceObservation {
                date: start + Duration::days(t),
                prices: vec![
                    price(100.0 * (1.0 + 0.0010 * x + 0.020 * (0.9 * x).sin())),
                    price(50.0 * (1.0 + 0.0006 * x + 0.015 * (1.3 * x).cos())),
                    price(80.0 * (1.0 + 0.0002 * x + 0.004 * (0.7 * x + 1.0).sin())),
                    price(120.0 * (1.0 + 0.0004 * x + 0.012 * (2.1 * x).sin())),
                ],
            }
        })
        .collect();
    PriceHistory::new(ASSETS.iter().map(|s| s.to_string()).collect(), observations).unwrap()
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[test]
fn test_history_to_optimal_weights() {
    let stats = calculate_asset_statistics(&history(), TRADING_DAYS, 0.02).unwrap().result;
    assert_eq!(stats.observations, 89);
    assert_eq!(stats.assets.len(), 4);

    let input = stats.to_optimization_input();
    assert_eq!(input.asset_names, ASSETS.iter().map(|s| s.to_string()).collect::<Vec<_>>());

    let result = optimize(&input, &OptimizerConfig::default()).unwrap();
    assert!(result.success);
    let total: f64 = result.optimal_weights.iter().sum();
    assert!((total - 1.0).abs() < 1e-6);
    for w in &result.optimal_weights {
        assert!(*w >= 0.05 - 1e-12 && *w <= 0.30 + 1e-12);
    }
}

#[test]
fn test_optimized_portfolio_risk_report() {
    let prices = history();
    let stats = calculate_asset_statistics(&prices, TRADING_DAYS, 0.02).unwrap().result;
    let result = optimize(&stats.to_optimization_input(), &OptimizerConfig::default()).unwrap();

    let daily = daily_returns(&prices).unwrap();
    let series = portfolio_returns(&daily, &result.optimal_weights).unwrap();
    assert_eq!(series.len(), 89);

    let report = calculate_risk_report(&RiskReportInput {
        returns: series,
        confidence_level: 0.95,
        omega_threshold: 0.0,
        risk_free_rate: 0.02,
        periods_per_year: TRADING_DAYS,
    })
    .unwrap()
    .result;
    assert!(report.conditional_value_at_risk <= report.value_at_risk);
    assert!(report.max_drawdown <= 0.0);
    assert!(report.volatility > 0.0);
}

#[test]
fn test_stress_on_historical_returns() {
    let prices = history();
    let daily = daily_returns(&prices).unwrap();
    let input = StressTestInput {
        assets: daily.assets.clone(),
        returns: daily.returns.clone(),
        weights: vec![0.25; 4],
        scenarios: vec![StressScenario {
            name: "equity selloff".into(),
            shocks: BTreeMap::from([("EQ_US".to_string(), -0.01), ("EQ_EU".to_string(), -0.01)]),
            mode: folio_core::risk::ShockMode::Additive,
        }],
    };
    let out = run_stress_tests(&input).unwrap().result;
    let expected = out.baseline_return - 0.005;
    assert!((out.scenarios[0].stressed_return - expected).abs() < 1e-12);
    assert!(out.scenarios[0].stressed_max_drawdown <= out.baseline_max_drawdown);
}

#[test]
fn test_history_is_its_own_source() {
    let prices = history();
    assert_eq!(prices.load().unwrap(), prices);
}

#[test]
fn test_short_history_rejected() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let err = PriceHistory::new(
        vec!["A".into()],
        vec![PriceObservation {
            date: start,
            prices: vec![price(10.0)],
        }],
    )
    .unwrap_err();
    assert!(matches!(err, FolioError::InsufficientData(_)));
}
