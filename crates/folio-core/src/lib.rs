pub mod error;
pub mod optimizer;
pub mod solver;
pub mod types;

pub(crate) mod linalg;

#[cfg(feature = "statistics")]
pub mod market_data;

#[cfg(feature = "risk_metrics")]
pub mod risk;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

#[cfg(feature = "forecast")]
pub mod forecast;

pub use error::FolioError;
pub use types::*;

/// Standard result type for all folio operations
pub type FolioResult<T> = Result<T, FolioError>;
