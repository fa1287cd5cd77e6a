//! Variance-stabilizing target transforms applied before model training.

use serde::{Deserialize, Serialize};

/// Strictly monotonic transform applied to a parameter's target before training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Train on raw values.
    #[default]
    Identity,
    /// `ln(1 + max(x, 0))`, for right-skewed non-negative accumulations such as precipitation.
    /// The inverse is clamped to be non-negative.
    Log1p,
}

impl Transform {
    pub fn forward(self, value: f64) -> f64 {
        match self {
            Transform::Identity => value,
            Transform::Log1p => value.max(0.0).ln_1p(),
        }
    }

    pub fn inverse(self, value: f64) -> f64 {
        match self {
            Transform::Identity => value,
            Transform::Log1p => value.exp_m1().max(0.0),
        }
    }

    /// Applies `forward` to every value, keeping NaN (missing) as NaN.
    pub fn forward_all(self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .map(|&v| if v.is_nan() { v } else { self.forward(v) })
            .collect()
    }

    pub fn inverse_all(self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.inverse(v)).collect()
    }
}
