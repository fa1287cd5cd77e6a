//! Gradient-boosted regression trees with squared or pinball loss.
//!
//! The booster starts from the loss-optimal constant (mean for squared loss,
//! τ-quantile for pinball loss), then repeatedly fits a [`RegressionTree`] to the
//! negative gradient and sets each leaf to the loss-optimal constant of the
//! residuals that land in it.

use crate::model::error::ModelError;
use crate::model::stats::{mean, percentile_of_sorted, sorted_finite};
use crate::model::tree::{BinnedMatrix, RegressionTree, TreeSettings};
use log::debug;
use serde::{Deserialize, Serialize};

/// Hyper-parameters of a [`GradientBooster`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub max_bins: usize,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 20,
            max_bins: 32,
        }
    }
}

/// Training objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Loss {
    Squared,
    /// Asymmetric pinball loss for quantile `tau` in `(0, 1)`.
    Pinball(f64),
}

impl Loss {
    fn initial(&self, targets: &[f64]) -> f64 {
        match *self {
            Loss::Squared => mean(targets).unwrap_or(0.0),
            Loss::Pinball(tau) => {
                percentile_of_sorted(&sorted_finite(targets.iter().copied()), tau * 100.0)
                    .unwrap_or(0.0)
            }
        }
    }

    fn negative_gradient(&self, target: f64, prediction: f64) -> f64 {
        match *self {
            Loss::Squared => target - prediction,
            Loss::Pinball(tau) => {
                if target > prediction {
                    tau
                } else {
                    tau - 1.0
                }
            }
        }
    }

    fn leaf_value(&self, residuals: Vec<f64>) -> f64 {
        match *self {
            Loss::Squared => mean(&residuals).unwrap_or(0.0),
            Loss::Pinball(tau) => {
                percentile_of_sorted(&sorted_finite(residuals), tau * 100.0).unwrap_or(0.0)
            }
        }
    }

    /// Loss of a single prediction.
    pub fn evaluate(&self, target: f64, prediction: f64) -> f64 {
        let diff = target - prediction;
        match *self {
            Loss::Squared => diff * diff,
            Loss::Pinball(tau) => {
                if diff >= 0.0 {
                    tau * diff
                } else {
                    (tau - 1.0) * diff
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradientBooster {
    base: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBooster {
    /// Fits a booster on `rows` against `targets`. Rows whose target is not finite are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyTrainingSet`] when no row has a finite target.
    pub fn fit(
        params: &BoosterParams,
        loss: Loss,
        rows: &[&[f64]],
        targets: &[f64],
    ) -> Result<Self, ModelError> {
        let (rows, y): (Vec<&[f64]>, Vec<f64>) = rows
            .iter()
            .zip(targets)
            .filter(|(_, t)| t.is_finite())
            .map(|(r, t)| (*r, *t))
            .unzip();
        if y.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }

        let base = loss.initial(&y);
        let mut booster = GradientBooster {
            base,
            learning_rate: params.learning_rate,
            trees: Vec::with_capacity(params.n_estimators),
        };
        if params.n_estimators == 0 {
            return Ok(booster);
        }

        let matrix = BinnedMatrix::new(&rows, params.max_bins);
        let settings = TreeSettings {
            max_depth: params.max_depth,
            min_samples_leaf: params.min_samples_leaf,
        };
        let mut current = vec![base; y.len()];

        for _ in 0..params.n_estimators {
            let gradients: Vec<f64> = y
                .iter()
                .zip(&current)
                .map(|(&t, &f)| loss.negative_gradient(t, f))
                .collect();
            let tree = RegressionTree::grow(
                &matrix,
                &gradients,
                (0..y.len()).collect(),
                settings,
                &mut |leaf: &[usize]| {
                    loss.leaf_value(leaf.iter().map(|&i| y[i] - current[i]).collect())
                },
            );
            for (prediction, row) in current.iter_mut().zip(&rows) {
                *prediction += params.learning_rate * tree.predict(row);
            }
            booster.trees.push(tree);
        }
        debug!(
            "Fitted {} trees on {} rows, mean training loss {:.4}",
            booster.n_trees(),
            y.len(),
            mean_loss(loss, &y, &current)
        );
        Ok(booster)
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.base
            + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn mean_loss(loss: Loss, targets: &[f64], predictions: &[f64]) -> f64 {
    let total: f64 = targets
        .iter()
        .zip(predictions)
        .map(|(&t, &p)| loss.evaluate(t, p))
        .sum();
    total / targets.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(n_estimators: usize) -> BoosterParams {
        BoosterParams {
            n_estimators,
            learning_rate: 0.2,
            max_depth: 2,
            min_samples_leaf: 5,
            max_bins: 32,
        }
    }

    /// y = 10 * x plus a deterministic symmetric spread of ±1, ±2.
    fn linear_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let offsets = [-2.0, -1.0, 0.0, 1.0, 2.0];
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for i in 0..200 {
            let x = (i / 5) as f64 / 40.0;
            rows.push(vec![x]);
            targets.push(10.0 * x + offsets[i % 5]);
        }
        (rows, targets)
    }

    #[test]
    fn test_squared_loss_tracks_signal() -> Result<(), ModelError> {
        let (rows, targets) = linear_data();
        let refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
        let booster = GradientBooster::fit(&params(60), Loss::Squared, &refs, &targets)?;
        assert_eq!(booster.n_trees(), 60);
        let low = booster.predict_row(&[0.1]);
        let high = booster.predict_row(&[0.9]);
        assert!(high - low > 5.0, "low={low} high={high}");
        Ok(())
    }

    #[test]
    fn test_pinball_quantiles_are_ordered_on_average() -> Result<(), ModelError> {
        let (rows, targets) = linear_data();
        let refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
        let q10 = GradientBooster::fit(&params(60), Loss::Pinball(0.1), &refs, &targets)?;
        let q90 = GradientBooster::fit(&params(60), Loss::Pinball(0.9), &refs, &targets)?;
        let lower: f64 = q10.predict(&rows).iter().sum();
        let upper: f64 = q90.predict(&rows).iter().sum();
        assert!(upper > lower);
        Ok(())
    }

    #[test]
    fn test_zero_estimators_is_climatology() -> Result<(), ModelError> {
        let rows = vec![vec![0.0]; 5];
        let refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
        let targets = [1.0, 2.0, 3.0, 4.0, 5.0];
        let median = GradientBooster::fit(&params(0), Loss::Pinball(0.5), &refs, &targets)?;
        assert_eq!(median.n_trees(), 0);
        assert_eq!(median.predict_row(&[123.0]), 3.0);
        let mean = GradientBooster::fit(&params(0), Loss::Squared, &refs, &targets)?;
        assert_eq!(mean.predict_row(&[0.0]), 3.0);
        Ok(())
    }

    #[test]
    fn test_non_finite_targets_are_skipped() -> Result<(), ModelError> {
        let rows = vec![vec![0.0]; 3];
        let refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
        let booster =
            GradientBooster::fit(&params(0), Loss::Squared, &refs, &[f64::NAN, 2.0, 4.0])?;
        assert_eq!(booster.predict_row(&[0.0]), 3.0);

        let err = GradientBooster::fit(&params(5), Loss::Squared, &refs, &[f64::NAN; 3]);
        assert!(matches!(err, Err(ModelError::EmptyTrainingSet)));
        Ok(())
    }

    #[test]
    fn test_pinball_evaluate_is_asymmetric() {
        let loss = Loss::Pinball(0.9);
        assert!((loss.evaluate(1.0, 0.0) - 0.9).abs() < 1e-12);
        assert!((loss.evaluate(0.0, 1.0) - 0.1).abs() < 1e-12);
    }
}
