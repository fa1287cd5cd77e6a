//! Regression models shared by both forecast engines.

pub mod booster;
pub mod error;
pub mod stats;
pub mod transform;
pub mod tree;

use crate::model::booster::BoosterParams;
use serde::{Deserialize, Serialize};

/// Model family selected per parameter from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelFamily {
    /// Gradient-boosted regression trees over the full feature matrix.
    Boosted(BoosterParams),
    /// Unconditional historical estimate (mean or τ-quantile of the target), ignoring features.
    Climatology,
}

impl Default for ModelFamily {
    fn default() -> Self {
        ModelFamily::Boosted(BoosterParams::default())
    }
}

impl ModelFamily {
    pub fn booster_params(&self) -> BoosterParams {
        match self {
            ModelFamily::Boosted(params) => *params,
            ModelFamily::Climatology => BoosterParams {
                n_estimators: 0,
                ..BoosterParams::default()
            },
        }
    }
}
