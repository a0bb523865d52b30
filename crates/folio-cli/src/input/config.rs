use folio_core::optimizer::OptimizerConfig;

use crate::input::file;

/// Optimizer settings from `--config`, or the defaults. Flags given on the
/// command line are applied on top by the caller.
pub fn load_config(path: Option<&str>) -> Result<OptimizerConfig, Box<dyn std::error::Error>> {
    match path {
        Some(p) => file::read_structured(p),
        None => Ok(OptimizerConfig::default()),
    }
}

/// Apply a command-line risk-free rate over the loaded config.
pub fn with_overrides(mut config: OptimizerConfig, risk_free_rate: Option<f64>) -> OptimizerConfig {
    if let Some(rf) = risk_free_rate {
        config.risk_free_rate = rf;
    }
    config
}
