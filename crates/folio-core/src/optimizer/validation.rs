use crate::error::FolioError;
use crate::optimizer::{CovarianceMatrix, OptimizationInput, OptimizerConfig};
use crate::FolioResult;

/// Reject undefined values and mismatched cost vectors.
///
/// Checks run in a fixed order (returns, covariance, initial weights,
/// costs, cost length) and the first failure is returned.
pub fn validate_inputs(
    returns: &[f64],
    covariance: &CovarianceMatrix,
    initial_weights: Option<&[f64]>,
    transaction_costs: Option<&[f64]>,
) -> FolioResult<()> {
    check_no_nan("annualized_returns", returns)?;

    if covariance.has_nan() {
        return Err(FolioError::invalid(
            "covariance_matrix",
            "Covariance matrix contains NaN values",
        ));
    }

    if let Some(w0) = initial_weights {
        check_no_nan("initial_weights", w0)?;
    }

    if let Some(costs) = transaction_costs {
        check_no_nan("transaction_costs", costs)?;
        if costs.len() != returns.len() {
            return Err(FolioError::invalid(
                "transaction_costs",
                format!(
                    "Expected {} values but got {}",
                    returns.len(),
                    costs.len()
                ),
            ));
        }
    }

    Ok(())
}

/// Full check of one optimization call: the value checks above plus every
/// dimension and configuration check the driver relies on.
pub fn validate_input(input: &OptimizationInput, config: &OptimizerConfig) -> FolioResult<()> {
    let returns = input.annualized_returns.as_slice();
    let n = returns.len();

    if n == 0 {
        return Err(FolioError::invalid(
            "annualized_returns",
            "At least one asset required",
        ));
    }

    validate_inputs(
        returns,
        &input.covariance_matrix,
        input.initial_weights.as_deref(),
        input.transaction_costs.as_deref(),
    )?;

    if input.covariance_matrix.dim() != n {
        return Err(FolioError::invalid(
            "covariance_matrix",
            format!(
                "Expected {}x{} matrix but got {}x{}",
                n,
                n,
                input.covariance_matrix.dim(),
                input.covariance_matrix.dim()
            ),
        ));
    }

    if let Some(ref w0) = input.initial_weights {
        if w0.len() != n {
            return Err(FolioError::invalid(
                "initial_weights",
                format!("Expected {} values but got {}", n, w0.len()),
            ));
        }
    }

    if let Some(ref bounds) = input.bounds {
        if bounds.len() != n {
            return Err(FolioError::invalid(
                "bounds",
                format!("Expected {} pairs but got {}", n, bounds.len()),
            ));
        }
        for (i, b) in bounds.iter().enumerate() {
            if !b.low.is_finite() || !b.high.is_finite() {
                return Err(FolioError::invalid(
                    format!("bounds[{}]", i),
                    "Bounds must be finite",
                ));
            }
            if b.low > b.high {
                return Err(FolioError::invalid(
                    format!("bounds[{}]", i),
                    format!("Lower bound {} exceeds upper bound {}", b.low, b.high),
                ));
            }
        }
    }

    if !input.asset_names.is_empty() && input.asset_names.len() != n {
        return Err(FolioError::invalid(
            "asset_names",
            format!("Expected {} names but got {}", n, input.asset_names.len()),
        ));
    }

    if !config.risk_free_rate.is_finite() {
        return Err(FolioError::invalid(
            "risk_free_rate",
            "Risk-free rate must be finite",
        ));
    }

    let band = config.weight_band;
    if !band.lower.is_finite() || !band.upper.is_finite() || band.lower > band.upper {
        return Err(FolioError::invalid(
            "weight_band",
            format!("Invalid band [{}, {}]", band.lower, band.upper),
        ));
    }

    if config.tolerance <= 0.0 || config.gradient_step <= 0.0 {
        return Err(FolioError::invalid(
            "tolerance",
            "Tolerance and gradient step must be positive",
        ));
    }

    Ok(())
}

fn check_no_nan(field: &str, values: &[f64]) -> FolioResult<()> {
    match values.iter().position(|v| v.is_nan()) {
        Some(i) => Err(FolioError::invalid(
            field,
            format!("Value at index {} is NaN", i),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::WeightBound;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn sigma() -> CovarianceMatrix {
        CovarianceMatrix::new(vec![vec![0.04, 0.0], vec![0.0, 0.04]]).unwrap()
    }

    fn field_of(err: FolioError) -> String {
        match err {
            FolioError::InvalidInput { field, .. } => field,
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_inputs_pass() {
        assert!(validate_inputs(&[0.08, 0.06], &sigma(), Some(&[0.5, 0.5]), Some(&[0.001, 0.001])).is_ok());
        assert!(validate_inputs(&[0.08, 0.06], &sigma(), None, None).is_ok());
    }

    #[test]
    fn test_nan_checks_in_order() {
        let nan = f64::NAN;
        let bad_cov = CovarianceMatrix::new(vec![vec![0.04, nan], vec![nan, 0.04]]).unwrap();

        let err = validate_inputs(&[nan, 0.06], &bad_cov, None, None).unwrap_err();
        assert_eq!(field_of(err), "annualized_returns");

        let err = validate_inputs(&[0.08, 0.06], &bad_cov, None, None).unwrap_err();
        assert_eq!(field_of(err), "covariance_matrix");

        let err = validate_inputs(&[0.08, 0.06], &sigma(), Some(&[nan, 0.5]), None).unwrap_err();
        assert_eq!(field_of(err), "initial_weights");

        let err = validate_inputs(&[0.08, 0.06], &sigma(), None, Some(&[0.0, nan])).unwrap_err();
        assert_eq!(field_of(err), "transaction_costs");
    }

    #[test]
    fn test_cost_length_mismatch() {
        let err = validate_inputs(&[0.08, 0.06], &sigma(), None, Some(&[0.001])).unwrap_err();
        assert_eq!(field_of(err), "transaction_costs");
    }

    #[test]
    fn test_dimension_checks() {
        let config = OptimizerConfig::default();

        let input = OptimizationInput::new(vec![0.08, 0.06, 0.05], sigma());
        assert_eq!(field_of(validate_input(&input, &config).unwrap_err()), "covariance_matrix");

        let input = OptimizationInput::new(vec![0.08, 0.06], sigma()).with_initial_weights(vec![1.0]);
        assert_eq!(field_of(validate_input(&input, &config).unwrap_err()), "initial_weights");

        let input = OptimizationInput::new(vec![0.08, 0.06], sigma()).with_bounds(vec![WeightBound::default()]);
        assert_eq!(field_of(validate_input(&input, &config).unwrap_err()), "bounds");

        let input = OptimizationInput::new(Vec::new(), sigma());
        assert_eq!(field_of(validate_input(&input, &config).unwrap_err()), "annualized_returns");
    }

    #[test]
    fn test_inverted_bound_rejected() {
        let input = OptimizationInput::new(vec![0.08, 0.06], sigma())
            .with_bounds(vec![WeightBound::new(0.0, 1.0), WeightBound::new(0.6, 0.4)]);
        let err = validate_input(&input, &OptimizerConfig::default()).unwrap_err();
        assert_eq!(field_of(err), "bounds[1]");
    }

    #[test]
    fn test_config_checks() {
        let input = OptimizationInput::new(vec![0.08, 0.06], sigma());

        let config = OptimizerConfig {
            risk_free_rate: f64::INFINITY,
            ..OptimizerConfig::default()
        };
        assert_eq!(field_of(validate_input(&input, &config).unwrap_err()), "risk_free_rate");

        let mut config = OptimizerConfig::default();
        config.weight_band.lower = 0.5;
        config.weight_band.upper = 0.1;
        assert_eq!(field_of(validate_input(&input, &config).unwrap_err()), "weight_band");
    }

    proptest! {
        #[test]
        fn prop_nan_anywhere_in_returns_is_rejected(
            mut returns in proptest::collection::vec(-0.5f64..0.5, 1..8),
            pos in any::<proptest::sample::Index>(),
        ) {
            let n = returns.len();
            let i = pos.index(n);
            returns[i] = f64::NAN;
            let cov = CovarianceMatrix::new(vec![vec![0.01; n]; n]).unwrap();
            let err = validate_inputs(&returns, &cov, None, None).unwrap_err();
            prop_assert_eq!(field_of(err), "annualized_returns".to_string());
        }
    }
}
