use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::FolioError;
use crate::types::{with_metadata, ComputationOutput};
use crate::FolioResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for a historical risk report over one return series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReportInput {
    /// Periodic (usually daily) returns, oldest first.
    pub returns: Vec<f64>,
    /// VaR / CVaR confidence level (default 0.95).
    #[serde(default = "default_confidence")]
    pub confidence_level: f64,
    /// Omega ratio threshold per period (default 0).
    #[serde(default)]
    pub omega_threshold: f64,
    /// Annual risk-free rate for the Sharpe ratio (default 0).
    #[serde(default)]
    pub risk_free_rate: f64,
    /// Periods per year for the annualized figures (default 252).
    #[serde(default = "default_periods")]
    pub periods_per_year: u32,
}

fn default_confidence() -> f64 {
    0.95
}

fn default_periods() -> u32 {
    252
}

/// Historical risk metrics of a return series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub observations: usize,
    pub mean_return: f64,
    pub volatility: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    /// `(annualized_return - risk_free_rate) / annualized_volatility`;
    /// `None` for a flat series.
    pub sharpe_ratio: Option<f64>,
    pub confidence_level: f64,
    /// Return at the (1 - confidence) quantile; negative means a loss.
    pub value_at_risk: f64,
    /// Mean return in the tail below the VaR index.
    pub conditional_value_at_risk: f64,
    /// Largest peak-to-trough decline of the compounded series (<= 0).
    pub max_drawdown: f64,
    /// `None` when no period falls at or below the threshold.
    pub omega_ratio: Option<f64>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Historical VaR: the return at index `floor((1 - c) * n)` of the sorted
/// series.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> FolioResult<f64> {
    let sorted = sorted_checked(returns, confidence)?;
    Ok(sorted[tail_index(sorted.len(), confidence)])
}

/// Historical CVaR: mean of the sorted returns strictly below the VaR
/// index. Falls back to VaR when that tail is empty.
pub fn conditional_value_at_risk(returns: &[f64], confidence: f64) -> FolioResult<f64> {
    let sorted = sorted_checked(returns, confidence)?;
    let idx = tail_index(sorted.len(), confidence);
    if idx == 0 {
        return Ok(sorted[0]);
    }
    Ok(sorted[..idx].iter().sum::<f64>() / idx as f64)
}

/// Maximum drawdown of the compounded return series, as a fraction <= 0.
pub fn max_drawdown(returns: &[f64]) -> FolioResult<f64> {
    if returns.is_empty() {
        return Err(FolioError::InsufficientData(
            "Max drawdown needs at least one return".into(),
        ));
    }
    check_no_nan(returns)?;

    let mut cumulative = 1.0;
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for r in returns {
        cumulative *= 1.0 + r;
        peak = peak.max(cumulative);
        worst = worst.min(cumulative / peak - 1.0);
    }
    Ok(worst)
}

/// Omega ratio: sum of gains above `threshold` over sum of shortfalls at or
/// below it.
pub fn omega_ratio(returns: &[f64], threshold: f64) -> FolioResult<f64> {
    if returns.is_empty() {
        return Err(FolioError::InsufficientData(
            "Omega ratio needs at least one return".into(),
        ));
    }
    check_no_nan(returns)?;

    let (gains, losses) = returns.iter().fold((0.0, 0.0), |(g, l), r| {
        let excess = r - threshold;
        if excess > 0.0 {
            (g + excess, l)
        } else {
            (g, l - excess)
        }
    });
    if losses == 0.0 {
        return Err(FolioError::DivisionByZero {
            context: "omega ratio: no returns at or below the threshold".into(),
        });
    }
    Ok(gains / losses)
}

/// Annualized excess return per unit of annualized volatility. `None` when
/// volatility is zero or not finite.
pub fn annualized_sharpe(annualized_return: f64, annualized_volatility: f64, risk_free_rate: f64) -> Option<f64> {
    (annualized_volatility > 0.0 && annualized_volatility.is_finite())
        .then(|| (annualized_return - risk_free_rate) / annualized_volatility)
}

/// Mean and sample standard deviation (n - 1).
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

/// Full report in the standard envelope.
pub fn calculate_risk_report(
    input: &RiskReportInput,
) -> FolioResult<ComputationOutput<RiskReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.periods_per_year == 0 {
        return Err(FolioError::invalid("periods_per_year", "Must be positive"));
    }

    let returns = &input.returns;
    let c = input.confidence_level;
    let value_at_risk = value_at_risk(returns, c)?;
    let conditional_value_at_risk = conditional_value_at_risk(returns, c)?;
    let max_drawdown = max_drawdown(returns)?;
    let omega_ratio = match omega_ratio(returns, input.omega_threshold) {
        Ok(v) => Some(v),
        Err(FolioError::DivisionByZero { .. }) => {
            warnings.push("No return at or below the omega threshold; omega ratio undefined".into());
            None
        }
        Err(e) => return Err(e),
    };

    let (mean_return, volatility) = mean_and_std(returns);
    let periods = input.periods_per_year as f64;
    let annualized_return = mean_return * periods;
    let annualized_volatility = volatility * periods.sqrt();
    let sharpe_ratio = annualized_sharpe(annualized_return, annualized_volatility, input.risk_free_rate);
    if sharpe_ratio.is_none() {
        warnings.push("Return series has zero volatility; Sharpe ratio undefined".into());
    }

    if tail_index(returns.len(), c) == 0 {
        warnings.push(format!(
            "{} observations leave no tail beyond VaR at {:.1}% confidence; CVaR equals VaR",
            returns.len(),
            c * 100.0
        ));
    }

    let report = RiskReport {
        observations: returns.len(),
        mean_return,
        volatility,
        annualized_return,
        annualized_volatility,
        sharpe_ratio,
        confidence_level: c,
        value_at_risk,
        conditional_value_at_risk,
        max_drawdown,
        omega_ratio,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Historical Risk Metrics (VaR, CVaR, Max Drawdown, Omega)",
        &serde_json::json!({
            "confidence_level": c,
            "omega_threshold": input.omega_threshold,
            "risk_free_rate": input.risk_free_rate,
            "periods_per_year": input.periods_per_year,
            "var_method": "historical, sorted index floor((1-c)*n)",
        }),
        warnings,
        elapsed,
        report,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn tail_index(n: usize, confidence: f64) -> usize {
    (((1.0 - confidence) * n as f64) as usize).min(n - 1)
}

fn sorted_checked(returns: &[f64], confidence: f64) -> FolioResult<Vec<f64>> {
    if returns.is_empty() {
        return Err(FolioError::InsufficientData(
            "At least one return required".into(),
        ));
    }
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(FolioError::invalid(
            "confidence_level",
            format!("Must be in (0, 1), got {}", confidence),
        ));
    }
    check_no_nan(returns)?;
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Ok(sorted)
}

fn check_no_nan(returns: &[f64]) -> FolioResult<()> {
    match returns.iter().position(|r| r.is_nan()) {
        Some(i) => Err(FolioError::invalid(
            "returns",
            format!("Value at index {} is NaN", i),
        )),
        None => Ok(()),
    }
}
