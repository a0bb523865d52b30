use serde::{Deserialize, Serialize};

use crate::error::FolioError;
use crate::solver::SolverOptions;
use crate::types::Rate;
use crate::FolioResult;

// ---------------------------------------------------------------------------
// Market inputs
// ---------------------------------------------------------------------------

/// Expected annualized return per asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetReturns(Vec<f64>);

impl AssetReturns {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for AssetReturns {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Square matrix of annualized return covariances, row-major.
///
/// The shape is checked when the matrix is built (including when it is
/// deserialized); NaN entries are left for the validator to report so that
/// the error names the offending input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct CovarianceMatrix {
    rows: Vec<Vec<f64>>,
}

impl CovarianceMatrix {
    pub fn new(rows: Vec<Vec<f64>>) -> FolioResult<Self> {
        if rows.is_empty() {
            return Err(FolioError::invalid(
                "covariance_matrix",
                "Matrix must have at least one row",
            ));
        }
        let n = rows.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(FolioError::invalid(
                    "covariance_matrix",
                    format!("Row {} has {} columns, expected {}", i, row.len(), n),
                ));
            }
        }
        Ok(Self { rows })
    }

    /// Number of assets.
    pub fn dim(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn variance(&self, asset: usize) -> f64 {
        self.rows[asset][asset]
    }

    pub fn has_nan(&self) -> bool {
        self.rows.iter().flatten().any(|v| v.is_nan())
    }
}

impl TryFrom<Vec<Vec<f64>>> for CovarianceMatrix {
    type Error = FolioError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::new(rows)
    }
}

impl From<CovarianceMatrix> for Vec<Vec<f64>> {
    fn from(matrix: CovarianceMatrix) -> Self {
        matrix.rows
    }
}

/// Per-asset `(low, high)` box bound enforced by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct WeightBound {
    pub low: f64,
    pub high: f64,
}

impl WeightBound {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }
}

impl Default for WeightBound {
    fn default() -> Self {
        Self {
            low: 0.0,
            high: 1.0,
        }
    }
}

impl From<(f64, f64)> for WeightBound {
    fn from((low, high): (f64, f64)) -> Self {
        Self { low, high }
    }
}

impl From<WeightBound> for (f64, f64) {
    fn from(b: WeightBound) -> Self {
        (b.low, b.high)
    }
}

/// Band every weight is clamped into while the objective is evaluated and
/// once more on the reported solution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightBand {
    pub lower: f64,
    pub upper: f64,
}

impl Default for WeightBand {
    fn default() -> Self {
        Self {
            lower: 0.05,
            upper: 0.30,
        }
    }
}

impl WeightBand {
    pub fn clamp(&self, weight: f64) -> f64 {
        weight.max(self.lower).min(self.upper)
    }

    pub fn clamp_all(&self, weights: &[f64]) -> Vec<f64> {
        weights.iter().map(|w| self.clamp(*w)).collect()
    }

    /// Band actually used for `n` assets.
    ///
    /// A band too narrow to hold a fully invested portfolio
    /// (`n * upper < 1` or `n * lower > 1`) is widened just enough to
    /// contain one: the cap rises to `1 - (n - 1) * lower` and the floor
    /// drops to `1 / n`.
    pub fn effective_for(&self, n: usize) -> WeightBand {
        let nf = n as f64;
        if nf * self.lower <= 1.0 && 1.0 <= nf * self.upper {
            return *self;
        }
        WeightBand {
            lower: self.lower.min(1.0 / nf),
            upper: self.upper.max(1.0 - (nf - 1.0) * self.lower),
        }
    }
}

// ---------------------------------------------------------------------------
// Call inputs
// ---------------------------------------------------------------------------

/// Everything the caller supplies for one optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationInput {
    /// Optional asset identifiers, used only for presentation.
    #[serde(default)]
    pub asset_names: Vec<String>,
    pub annualized_returns: AssetReturns,
    pub covariance_matrix: CovarianceMatrix,
    /// Pre-rebalance allocation; defaults to 1/N each.
    #[serde(default)]
    pub initial_weights: Option<Vec<f64>>,
    /// Per-asset proportional cost rates; defaults to zero.
    #[serde(default)]
    pub transaction_costs: Option<Vec<f64>>,
    /// Per-asset box bounds; defaults to (0, 1).
    #[serde(default)]
    pub bounds: Option<Vec<WeightBound>>,
}

impl OptimizationInput {
    pub fn new(annualized_returns: impl Into<AssetReturns>, covariance_matrix: CovarianceMatrix) -> Self {
        Self {
            asset_names: Vec::new(),
            annualized_returns: annualized_returns.into(),
            covariance_matrix,
            initial_weights: None,
            transaction_costs: None,
            bounds: None,
        }
    }

    pub fn with_asset_names(mut self, names: Vec<String>) -> Self {
        self.asset_names = names;
        self
    }

    pub fn with_initial_weights(mut self, weights: Vec<f64>) -> Self {
        self.initial_weights = Some(weights);
        self
    }

    pub fn with_transaction_costs(mut self, costs: Vec<f64>) -> Self {
        self.transaction_costs = Some(costs);
        self
    }

    pub fn with_bounds(mut self, bounds: Vec<WeightBound>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn n_assets(&self) -> usize {
        self.annualized_returns.len()
    }

    pub(crate) fn initial_weights_or_default(&self) -> Vec<f64> {
        let n = self.n_assets();
        self.initial_weights
            .clone()
            .unwrap_or_else(|| vec![1.0 / n as f64; n])
    }

    pub(crate) fn transaction_costs_or_default(&self) -> Vec<f64> {
        self.transaction_costs
            .clone()
            .unwrap_or_else(|| vec![0.0; self.n_assets()])
    }

    pub(crate) fn bounds_or_default(&self) -> Vec<WeightBound> {
        self.bounds
            .clone()
            .unwrap_or_else(|| vec![WeightBound::default(); self.n_assets()])
    }
}

/// Per-call settings. Every field has a default so a config file may set
/// any subset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub risk_free_rate: Rate,
    pub weight_band: WeightBand,
    pub max_iterations: u32,
    pub tolerance: f64,
    pub gradient_step: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        let solver = SolverOptions::default();
        Self {
            risk_free_rate: 0.02,
            weight_band: WeightBand::default(),
            max_iterations: solver.max_iterations,
            tolerance: solver.tolerance,
            gradient_step: solver.gradient_step,
        }
    }
}

impl OptimizerConfig {
    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            gradient_step: self.gradient_step,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Outcome of one successful optimization. Sharpe ratio and cost penalty are
/// recomputed from `optimal_weights`, not taken from the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub optimal_weights: Vec<f64>,
    pub sharpe_ratio: f64,
    pub transaction_cost_penalty: f64,
    pub success: bool,
    pub message: String,
    pub expected_return: f64,
    pub volatility: f64,
    pub iterations: u32,
    pub function_evaluations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_covariance_rejects_ragged_rows() {
        let err = CovarianceMatrix::new(vec![vec![0.04, 0.0], vec![0.0]]).unwrap_err();
        match err {
            FolioError::InvalidInput { field, .. } => assert_eq!(field, "covariance_matrix"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
        assert!(CovarianceMatrix::new(Vec::new()).is_err());
    }

    #[test]
    fn test_covariance_deserializes_through_shape_check() {
        let ok: CovarianceMatrix = serde_json::from_str("[[0.04, 0.01], [0.01, 0.09]]").unwrap();
        assert_eq!(ok.dim(), 2);
        assert_eq!(ok.variance(1), 0.09);

        let bad: Result<CovarianceMatrix, _> = serde_json::from_str("[[0.04, 0.01, 0.0], [0.01, 0.09]]");
        assert!(bad.is_err());
    }

    #[test]
    fn test_input_from_json_with_defaults() {
        let input: OptimizationInput = serde_json::from_str(
            r#"{
                "annualized_returns": [0.10, 0.05],
                "covariance_matrix": [[0.05, 0.01], [0.01, 0.03]],
                "bounds": [[0.0, 0.8], [0.1, 1.0]]
            }"#,
        )
        .unwrap();
        assert_eq!(input.initial_weights_or_default(), vec![0.5, 0.5]);
        assert_eq!(input.transaction_costs_or_default(), vec![0.0, 0.0]);
        assert_eq!(
            input.bounds_or_default(),
            vec![WeightBound::new(0.0, 0.8), WeightBound::new(0.1, 1.0)]
        );
    }

    #[test]
    fn test_config_fills_missing_fields() {
        let config: OptimizerConfig = serde_json::from_str(r#"{"risk_free_rate": 0.03}"#).unwrap();
        assert_eq!(config.risk_free_rate, 0.03);
        assert_eq!(config.weight_band, WeightBand::default());
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.solver_options(), SolverOptions::default());
    }

    #[test]
    fn test_band_kept_when_it_admits_full_investment() {
        let band = WeightBand::default();
        assert_eq!(band.effective_for(4), band);
        assert_eq!(band.effective_for(20), band);
    }

    #[test]
    fn test_band_widened_for_small_universe() {
        let band = WeightBand::default().effective_for(2);
        assert_eq!(band.lower, 0.05);
        assert!((band.upper - 0.95).abs() < 1e-15);

        let three = WeightBand::default().effective_for(3);
        assert!((three.upper - 0.90).abs() < 1e-15);
    }

    #[test]
    fn test_band_floor_lowered_for_large_universe() {
        let band = WeightBand::default().effective_for(25);
        assert!((band.lower - 0.04).abs() < 1e-15);
        assert_eq!(band.upper, 0.30);
    }
}
