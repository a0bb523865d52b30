use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::FolioError;
use crate::market_data::PriceHistory;
use crate::optimizer::{AssetReturns, CovarianceMatrix, OptimizationInput};
use crate::types::{with_metadata, ComputationOutput};
use crate::FolioResult;

/// Trading days per year used to annualize daily figures.
pub const TRADING_DAYS: u32 = 252;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Periodic returns, one row per date (the date the period ends on).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    pub assets: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub returns: Vec<Vec<f64>>,
}

impl ReturnSeries {
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// Return column of one asset.
    pub fn column(&self, asset: usize) -> Vec<f64> {
        self.returns.iter().map(|row| row[asset]).collect()
    }
}

/// Descriptive statistics of a price history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetStatistics {
    pub assets: Vec<String>,
    pub observations: usize,
    pub trading_days: u32,
    pub annualized_returns: AssetReturns,
    pub annualized_volatility: Vec<f64>,
    pub risk_free_rate: f64,
    /// Per-asset `(return - risk_free_rate) / volatility`; `None` for an
    /// asset whose price never moved.
    pub sharpe_ratios: Vec<Option<f64>>,
    pub covariance_matrix: CovarianceMatrix,
    pub correlation_matrix: Vec<Vec<f64>>,
}

impl AssetStatistics {
    /// Forward-fill, take simple daily returns and annualize.
    pub fn from_history(history: &PriceHistory, trading_days: u32, risk_free_rate: f64) -> FolioResult<Self> {
        let daily = daily_returns(history)?;
        Self::from_returns(&daily, trading_days, risk_free_rate)
    }

    pub fn from_returns(daily: &ReturnSeries, trading_days: u32, risk_free_rate: f64) -> FolioResult<Self> {
        let covariance_matrix = covariance_matrix(daily, trading_days)?;
        let n = covariance_matrix.dim();
        let annualized_volatility: Vec<f64> = (0..n).map(|i| covariance_matrix.variance(i).sqrt()).collect();
        let correlation_matrix = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| {
                        let denom = annualized_volatility[i] * annualized_volatility[j];
                        if denom > 0.0 {
                            covariance_matrix.rows()[i][j] / denom
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();

        let annualized_returns = annualized_returns(daily, trading_days);
        let sharpe_ratios = annualized_returns
            .as_slice()
            .iter()
            .zip(annualized_volatility.iter())
            .map(|(r, vol)| {
                (*vol > 0.0 && vol.is_finite()).then(|| (r - risk_free_rate) / vol)
            })
            .collect();

        Ok(Self {
            assets: daily.assets.clone(),
            observations: daily.len(),
            trading_days,
            annualized_returns,
            annualized_volatility,
            risk_free_rate,
            sharpe_ratios,
            covariance_matrix,
            correlation_matrix,
        })
    }

    /// Optimizer input seeded with these statistics and default weights,
    /// costs and bounds.
    pub fn to_optimization_input(&self) -> OptimizationInput {
        OptimizationInput::new(self.annualized_returns.clone(), self.covariance_matrix.clone())
            .with_asset_names(self.assets.clone())
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Simple returns `Pₜ / Pₜ₋₁ - 1` after forward-filling missing prices.
pub fn daily_returns(history: &PriceHistory) -> FolioResult<ReturnSeries> {
    period_returns(history, |prev, curr| curr / prev - 1.0)
}

/// Log returns `ln(Pₜ / Pₜ₋₁)` after forward-filling missing prices.
pub fn log_returns(history: &PriceHistory) -> FolioResult<ReturnSeries> {
    period_returns(history, |prev, curr| (curr / prev).ln())
}

/// Mean daily return times `trading_days`.
pub fn annualized_returns(daily: &ReturnSeries, trading_days: u32) -> AssetReturns {
    let n = daily.assets.len();
    let count = daily.len() as f64;
    let means = (0..n)
        .map(|j| daily.returns.iter().map(|row| row[j]).sum::<f64>() / count * trading_days as f64)
        .collect();
    AssetReturns::new(means)
}

/// Sample covariance (n - 1 denominator) times `trading_days`.
pub fn covariance_matrix(daily: &ReturnSeries, trading_days: u32) -> FolioResult<CovarianceMatrix> {
    let t = daily.len();
    if t < 2 {
        return Err(FolioError::InsufficientData(format!(
            "Covariance needs at least 2 return observations, got {}",
            t
        )));
    }
    let n = daily.assets.len();
    let means: Vec<f64> = (0..n)
        .map(|j| daily.returns.iter().map(|row| row[j]).sum::<f64>() / t as f64)
        .collect();

    let scale = trading_days as f64 / (t - 1) as f64;
    let mut cov = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let s: f64 = daily
                .returns
                .iter()
                .map(|row| (row[i] - means[i]) * (row[j] - means[j]))
                .sum();
            cov[i][j] = s * scale;
            cov[j][i] = cov[i][j];
        }
    }
    CovarianceMatrix::new(cov)
}

/// Daily portfolio return series for fixed weights.
pub fn portfolio_returns(daily: &ReturnSeries, weights: &[f64]) -> FolioResult<Vec<f64>> {
    if weights.len() != daily.assets.len() {
        return Err(FolioError::invalid(
            "weights",
            format!(
                "Expected {} weights but got {}",
                daily.assets.len(),
                weights.len()
            ),
        ));
    }
    Ok(daily
        .returns
        .iter()
        .map(|row| row.iter().zip(weights.iter()).map(|(r, w)| r * w).sum())
        .collect())
}

/// [`AssetStatistics::from_history`] in the standard envelope.
pub fn calculate_asset_statistics(
    history: &PriceHistory,
    trading_days: u32,
    risk_free_rate: f64,
) -> FolioResult<ComputationOutput<AssetStatistics>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    if trading_days == 0 {
        return Err(FolioError::invalid("trading_days", "Must be positive"));
    }

    let missing = history
        .observations()
        .iter()
        .flat_map(|o| o.prices.iter())
        .filter(|p| p.is_none())
        .count();
    if missing > 0 {
        warnings.push(format!("{} missing prices were forward-filled", missing));
    }

    let stats = AssetStatistics::from_history(history, trading_days, risk_free_rate)?;
    if stats.observations < 30 {
        warnings.push(format!(
            "Only {} return observations; annualized estimates are noisy",
            stats.observations
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Annualized Sample Statistics of Simple Daily Returns",
        &serde_json::json!({
            "trading_days": trading_days,
            "risk_free_rate": risk_free_rate,
            "returns": "simple, forward-filled",
            "covariance": "sample (n-1)",
            "assets": history.assets(),
        }),
        warnings,
        elapsed,
        stats,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn period_returns(history: &PriceHistory, f: impl Fn(f64, f64) -> f64) -> FolioResult<ReturnSeries> {
    let prices = history.filled_matrix()?;
    let dates = history.dates();

    let mut returns = Vec::with_capacity(prices.len().saturating_sub(1));
    for (t, pair) in prices.windows(2).enumerate() {
        let row = pair[0]
            .iter()
            .zip(pair[1].iter())
            .zip(history.assets().iter())
            .map(|((prev, curr), asset)| {
                if *prev == 0.0 {
                    Err(FolioError::DivisionByZero {
                        context: format!("return of {} on {}: previous price is zero", asset, dates[t + 1]),
                    })
                } else {
                    Ok(f(*prev, *curr))
                }
            })
            .collect::<FolioResult<Vec<f64>>>()?;
        returns.push(row);
    }

    Ok(ReturnSeries {
        assets: history.assets().to_vec(),
        dates: dates[1..].to_vec(),
        returns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PriceObservation;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn history() -> PriceHistory {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        PriceHistory::new(
            vec!["AAA".into(), "BBB".into()],
            vec![
                PriceObservation { date: d(1), prices: vec![Some(dec!(100)), Some(dec!(50))] },
                PriceObservation { date: d(4), prices: vec![Some(dec!(110)), None] },
                PriceObservation { date: d(5), prices: vec![Some(dec!(99)), Some(dec!(55))] },
                PriceObservation { date: d(6), prices: vec![Some(dec!(99)), Some(dec!(44))] },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_daily_returns_forward_fill() {
        let daily = daily_returns(&history()).unwrap();
        assert_eq!(daily.len(), 3);
        assert!((daily.returns[0][0] - 0.10).abs() < 1e-12);
        assert_eq!(daily.returns[0][1], 0.0);
        assert!((daily.returns[1][0] + 0.10).abs() < 1e-12);
        assert!((daily.returns[1][1] - 0.10).abs() < 1e-12);
        assert!((daily.returns[2][1] + 0.20).abs() < 1e-12);
        assert_eq!(daily.dates[0], NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }

    #[test]
    fn test_log_returns() {
        let logs = log_returns(&history()).unwrap();
        assert!((logs.returns[0][0] - 1.1_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_annualization() {
        let daily = daily_returns(&history()).unwrap();
        let ann = annualized_returns(&daily, 252);
        let mean_a = (0.10 - 0.10 + 0.0) / 3.0;
        assert!((ann.as_slice()[0] - mean_a * 252.0).abs() < 1e-9);

        let cov = covariance_matrix(&daily, 252).unwrap();
        let col = daily.column(1);
        let m = col.iter().sum::<f64>() / 3.0;
        let var = col.iter().map(|r| (r - m).powi(2)).sum::<f64>() / 2.0 * 252.0;
        assert!((cov.variance(1) - var).abs() < 1e-12);
        assert_eq!(cov.rows()[0][1], cov.rows()[1][0]);
    }

    #[test]
    fn test_portfolio_returns_weighted() {
        let daily = daily_returns(&history()).unwrap();
        let port = portfolio_returns(&daily, &[0.5, 0.5]).unwrap();
        assert!((port[2] - (0.0 * 0.5 - 0.20 * 0.5)).abs() < 1e-12);
        assert!(portfolio_returns(&daily, &[1.0]).is_err());
    }

    #[test]
    fn test_statistics_envelope_warns_about_gaps() {
        let out = calculate_asset_statistics(&history(), TRADING_DAYS, 0.02).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("forward-filled")));
        assert_eq!(out.result.observations, 3);
        assert!((out.result.correlation_matrix[0][0] - 1.0).abs() < 1e-12);
        assert_eq!(out.result.to_optimization_input().asset_names, vec!["AAA", "BBB"]);
    }

    #[test]
    fn test_per_asset_sharpe_ratios() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        let history = PriceHistory::new(
            vec!["AAA".into(), "FLAT".into()],
            vec![
                PriceObservation { date: d(1), prices: vec![Some(dec!(100)), Some(dec!(10))] },
                PriceObservation { date: d(4), prices: vec![Some(dec!(102)), Some(dec!(10))] },
                PriceObservation { date: d(5), prices: vec![Some(dec!(101)), Some(dec!(10))] },
                PriceObservation { date: d(6), prices: vec![Some(dec!(104)), Some(dec!(10))] },
            ],
        )
        .unwrap();
        let stats = AssetStatistics::from_history(&history, TRADING_DAYS, 0.03).unwrap();
        let expected = (stats.annualized_returns.as_slice()[0] - 0.03) / stats.annualized_volatility[0];
        assert!((stats.sharpe_ratios[0].unwrap() - expected).abs() < 1e-12);
        assert_eq!(stats.sharpe_ratios[1], None);
        assert_eq!(stats.risk_free_rate, 0.03);
    }

    #[test]
    fn test_zero_price_rejected() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        let history = PriceHistory::new(
            vec!["AAA".into()],
            vec![
                PriceObservation { date: d(1), prices: vec![Some(dec!(0))] },
                PriceObservation { date: d(2), prices: vec![Some(dec!(1))] },
            ],
        )
        .unwrap();
        assert!(matches!(daily_returns(&history), Err(FolioError::DivisionByZero { .. })));
    }
}
