use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::FolioError;
use crate::linalg::{dot, solve_linear_system};
use crate::types::{with_metadata, ComputationOutput};
use crate::FolioResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for a lagged linear forecast of one return series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastInput {
    /// Periodic returns, oldest first.
    pub returns: Vec<f64>,
    /// Number of lagged returns used as regressors (default 5).
    #[serde(default = "default_lag")]
    pub lag: usize,
    /// Periods to forecast past the last observation (default 5).
    #[serde(default = "default_horizon")]
    pub horizon: usize,
    /// Share of the samples held out for the test error (default 0.2).
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
}

fn default_lag() -> usize {
    5
}

fn default_horizon() -> usize {
    5
}

fn default_test_fraction() -> f64 {
    0.2
}

/// Regression samples built from a return series. Row `i` holds the `lag`
/// returns preceding `targets[i]`, most recent first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaggedFeatures {
    pub lag: usize,
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl LaggedFeatures {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// `y = intercept + Σ coefficients[i] · lag_(i+1)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn predict(&self, lags: &[f64]) -> f64 {
        self.intercept + dot(&self.coefficients, lags)
    }
}

/// A model fitted on the leading samples and scored on the held-out tail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub model: LinearModel,
    pub train_size: usize,
    pub test_size: usize,
    pub train_mse: f64,
    pub test_mse: f64,
    pub test_predictions: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    pub lag: usize,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub train_size: usize,
    pub test_size: usize,
    pub train_mse: f64,
    pub test_mse: f64,
    /// Forecast returns for the next `horizon` periods.
    pub predictions: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lagged-return regressors and their targets.
pub fn prepare_features(returns: &[f64], lag: usize) -> FolioResult<LaggedFeatures> {
    if lag == 0 {
        return Err(FolioError::invalid("lag", "Must be at least 1"));
    }
    if let Some(i) = returns.iter().position(|r| !r.is_finite()) {
        return Err(FolioError::invalid(
            "returns",
            format!("Value at index {} is not finite", i),
        ));
    }
    if returns.len() <= lag {
        return Err(FolioError::InsufficientData(format!(
            "Lag {} needs more than {} returns, got {}",
            lag,
            lag,
            returns.len()
        )));
    }

    let features = (lag..returns.len())
        .map(|t| returns[t - lag..t].iter().rev().copied().collect())
        .collect();
    Ok(LaggedFeatures {
        lag,
        features,
        targets: returns[lag..].to_vec(),
    })
}

/// Ordinary least squares with an intercept, solved from the normal
/// equations `X'X β = X'y`.
#[allow(clippy::needless_range_loop)]
pub fn fit_linear_model(features: &[Vec<f64>], targets: &[f64]) -> FolioResult<LinearModel> {
    if features.len() != targets.len() {
        return Err(FolioError::invalid(
            "targets",
            format!("Expected {} targets but got {}", features.len(), targets.len()),
        ));
    }
    let k = features.first().map_or(0, Vec::len);
    let cols = k + 1;
    if features.len() < cols {
        return Err(FolioError::InsufficientData(format!(
            "Regression on {} regressors needs at least {} samples, got {}",
            k,
            cols,
            features.len()
        )));
    }

    let mut xtx = vec![vec![0.0; cols]; cols];
    let mut xty = vec![0.0; cols];
    for (row, y) in features.iter().zip(targets.iter()) {
        if row.len() != k {
            return Err(FolioError::invalid(
                "features",
                format!("Expected rows of {} values but got {}", k, row.len()),
            ));
        }
        let x: Vec<f64> = std::iter::once(1.0).chain(row.iter().copied()).collect();
        for i in 0..cols {
            xty[i] += x[i] * y;
            for j in 0..cols {
                xtx[i][j] += x[i] * x[j];
            }
        }
    }

    let beta = solve_linear_system(&xtx, &xty).ok_or_else(|| FolioError::ConvergenceFailure {
        iterations: 0,
        message: "Singular normal equations in lag regression".into(),
    })?;
    Ok(LinearModel {
        intercept: beta[0],
        coefficients: beta[1..].to_vec(),
    })
}

/// Fit on the leading samples and score on the last
/// `ceil(test_fraction * n)`. The split keeps time order.
pub fn train_model(data: &LaggedFeatures, test_fraction: f64) -> FolioResult<TrainedModel> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(FolioError::invalid(
            "test_fraction",
            format!("Must be in (0, 1), got {}", test_fraction),
        ));
    }
    if data.is_empty() {
        return Err(FolioError::InsufficientData(
            "No samples to train the forecast model".into(),
        ));
    }

    let n = data.len();
    let test_size = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n);
    let train_size = n - test_size;
    let (train_x, test_x) = data.features.split_at(train_size);
    let (train_y, test_y) = data.targets.split_at(train_size);

    let model = fit_linear_model(train_x, train_y)?;
    let train_predictions: Vec<f64> = train_x.iter().map(|x| model.predict(x)).collect();
    let test_predictions: Vec<f64> = test_x.iter().map(|x| model.predict(x)).collect();

    Ok(TrainedModel {
        train_mse: mean_squared_error(train_y, &train_predictions),
        test_mse: mean_squared_error(test_y, &test_predictions),
        model,
        train_size,
        test_size,
        test_predictions,
    })
}

/// Roll the model forward `days` periods from the end of `history`, feeding
/// each prediction back in as the newest lag.
pub fn predict_future(model: &LinearModel, history: &[f64], days: usize) -> FolioResult<Vec<f64>> {
    let lag = model.coefficients.len();
    if history.len() < lag {
        return Err(FolioError::InsufficientData(format!(
            "Forecast needs the last {} returns, got {}",
            lag,
            history.len()
        )));
    }

    let mut window: Vec<f64> = history[history.len() - lag..].iter().rev().copied().collect();
    let mut predictions = Vec::with_capacity(days);
    for _ in 0..days {
        let next = model.predict(&window);
        predictions.push(next);
        window.insert(0, next);
        window.truncate(lag);
    }
    Ok(predictions)
}

/// Prepare features, train, and forecast `horizon` periods, in the standard
/// envelope.
pub fn forecast_returns(input: &ForecastInput) -> FolioResult<ComputationOutput<ForecastResult>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    if input.horizon == 0 {
        return Err(FolioError::invalid("horizon", "Must be at least 1"));
    }

    let data = prepare_features(&input.returns, input.lag)?;
    let trained = train_model(&data, input.test_fraction)?;
    let predictions = predict_future(&trained.model, &input.returns, input.horizon)?;

    if trained.train_size < 10 * (input.lag + 1) {
        warnings.push(format!(
            "Only {} training samples for {} coefficients; estimates are noisy",
            trained.train_size,
            input.lag + 1
        ));
    }
    if trained.test_mse > 2.0 * trained.train_mse && trained.test_mse > 0.0 {
        warnings.push(format!(
            "Test MSE {:.3e} is more than twice the training MSE {:.3e}",
            trained.test_mse, trained.train_mse
        ));
    }

    debug!(
        lag = input.lag,
        train = trained.train_size,
        test = trained.test_size,
        test_mse = trained.test_mse,
        "fitted lag regression"
    );

    let result = ForecastResult {
        lag: input.lag,
        intercept: trained.model.intercept,
        coefficients: trained.model.coefficients,
        train_size: trained.train_size,
        test_size: trained.test_size,
        train_mse: trained.train_mse,
        test_mse: trained.test_mse,
        predictions,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Lagged Linear Regression Forecast (OLS)",
        &serde_json::json!({
            "lag": input.lag,
            "horizon": input.horizon,
            "test_fraction": input.test_fraction,
            "split": "chronological, last samples held out",
            "multi_step": "recursive, predictions fed back as lags",
        }),
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}
