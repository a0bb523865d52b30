use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::FolioError;
use crate::types::Money;
use crate::FolioResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Closing prices for every asset on one date. `None` marks a missing quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub prices: Vec<Option<Money>>,
}

/// Date-indexed price table, one column per asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    assets: Vec<String>,
    observations: Vec<PriceObservation>,
}

/// Anything that can produce a price table: files, caches, vendors.
pub trait PriceSource {
    fn load(&self) -> FolioResult<PriceHistory>;
}

impl PriceSource for PriceHistory {
    fn load(&self) -> FolioResult<PriceHistory> {
        Ok(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl PriceHistory {
    /// Build a price table. Every row must carry one entry per asset, dates
    /// must be strictly increasing and at least two rows are needed to
    /// produce a return.
    pub fn new(assets: Vec<String>, observations: Vec<PriceObservation>) -> FolioResult<Self> {
        if assets.is_empty() {
            return Err(FolioError::invalid("assets", "At least one asset required"));
        }
        if observations.len() < 2 {
            return Err(FolioError::InsufficientData(format!(
                "At least 2 price observations required, got {}",
                observations.len()
            )));
        }
        for (i, obs) in observations.iter().enumerate() {
            if obs.prices.len() != assets.len() {
                return Err(FolioError::invalid(
                    format!("observations[{}]", i),
                    format!(
                        "Expected {} prices but got {}",
                        assets.len(),
                        obs.prices.len()
                    ),
                ));
            }
        }
        for pair in observations.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(FolioError::invalid(
                    "observations",
                    format!(
                        "Dates must be strictly increasing ({} follows {})",
                        pair[1].date, pair[0].date
                    ),
                ));
            }
        }
        Ok(Self {
            assets,
            observations,
        })
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn observations(&self) -> &[PriceObservation] {
        &self.observations
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Fill each missing price with the last seen price of that asset.
    /// Gaps before an asset's first quote stay missing.
    pub fn forward_fill(&self) -> PriceHistory {
        let mut last: Vec<Option<Money>> = vec![None; self.assets.len()];
        let observations = self
            .observations
            .iter()
            .map(|obs| {
                let prices = obs
                    .prices
                    .iter()
                    .zip(last.iter_mut())
                    .map(|(p, seen)| {
                        if p.is_some() {
                            *seen = *p;
                        }
                        *seen
                    })
                    .collect();
                PriceObservation {
                    date: obs.date,
                    prices,
                }
            })
            .collect();
        PriceHistory {
            assets: self.assets.clone(),
            observations,
        }
    }

    /// Forward-filled prices as `f64`, one row per date.
    pub(crate) fn filled_matrix(&self) -> FolioResult<Vec<Vec<f64>>> {
        let filled = self.forward_fill();
        filled
            .observations
            .iter()
            .map(|obs| {
                obs.prices
                    .iter()
                    .zip(self.assets.iter())
                    .map(|(p, asset)| match p {
                        Some(price) => price.to_f64().ok_or_else(|| {
                            FolioError::invalid(asset.clone(), format!("Price {} is not representable", price))
                        }),
                        None => Err(FolioError::InsufficientData(format!(
                            "No price for {} on or before {}",
                            asset, obs.date
                        ))),
                    })
                    .collect()
            })
            .collect()
    }
}
