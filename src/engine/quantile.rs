use crate::config::parameter::ParameterProfile;
use crate::config::ForecastConfig;
use crate::engine::{
    check_columns, settle_crossings, tau_to_percentile, EngineKind, ForecastEngine,
    ParameterForecast, PredictionTable, QuantileSeries,
};
use crate::features::{TargetSet, TrainingSet};
use crate::model::booster::{GradientBooster, Loss};
use crate::model::error::ModelError;
use log::debug;

const TAU_TOLERANCE: f64 = 1e-9;

/// Where the point forecast comes from in a quantile list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MedianSource {
    /// Index of τ = 0.5.
    Direct(usize),
    /// Indices of the closest pair τ, 1 − τ around 0.5, averaged.
    SymmetricPair(usize, usize),
}

/// Resolves the median for an ascending quantile list, or `None` if neither
/// τ = 0.5 nor a symmetric pair is present.
pub fn resolve_median(quantiles: &[f64]) -> Option<MedianSource> {
    if let Some(i) = quantiles
        .iter()
        .position(|&q| (q - 0.5).abs() < TAU_TOLERANCE)
    {
        return Some(MedianSource::Direct(i));
    }
    quantiles
        .iter()
        .enumerate()
        .filter(|&(_, &q)| q < 0.5)
        .rev()
        .find_map(|(i, &low)| {
            quantiles
                .iter()
                .position(|&high| (low + high - 1.0).abs() < TAU_TOLERANCE)
                .map(|j| MedianSource::SymmetricPair(i, j))
        })
}

/// One independent pinball-loss booster per (parameter, τ).
#[derive(Debug, Clone)]
pub struct QuantileForecastEnsemble {
    profiles: Vec<ParameterProfile>,
    quantiles: Vec<f64>,
    rearrange: bool,
}

impl QuantileForecastEnsemble {
    pub fn new(config: &ForecastConfig) -> Self {
        Self {
            profiles: config.parameters().to_vec(),
            quantiles: config.quantiles().to_vec(),
            rearrange: config.rearrange_quantiles(),
        }
    }

    fn forecast_parameter(
        &self,
        profile: &ParameterProfile,
        training: &TrainingSet,
        targets: &TargetSet,
        median: MedianSource,
    ) -> Result<ParameterForecast, ModelError> {
        let raw = training
            .target(&profile.name)
            .ok_or_else(|| ModelError::MissingTarget(profile.name.clone()))?;
        let y = profile.transform.forward_all(raw);
        if !y.iter().any(|v| v.is_finite()) {
            return Err(ModelError::NoFiniteTargets(profile.name.clone()));
        }

        let rows = training.features.row_slices();
        let params = profile.model.booster_params();
        let mut quantiles = Vec::with_capacity(self.quantiles.len());
        for &tau in &self.quantiles {
            let booster = GradientBooster::fit(&params, Loss::Pinball(tau), &rows, &y)?;
            let predicted = booster.predict(&targets.features.rows);
            quantiles.push(QuantileSeries {
                percentile: tau_to_percentile(tau),
                values: profile.transform.inverse_all(&predicted),
            });
        }

        settle_crossings(&profile.name, &mut quantiles, self.rearrange);

        let point = match median {
            MedianSource::Direct(i) => quantiles[i].values.clone(),
            MedianSource::SymmetricPair(i, j) => quantiles[i]
                .values
                .iter()
                .zip(&quantiles[j].values)
                .map(|(a, b)| (a + b) / 2.0)
                .collect(),
        };

        Ok(ParameterForecast {
            parameter: profile.name.clone(),
            point,
            quantiles,
        })
    }
}

impl ForecastEngine for QuantileForecastEnsemble {
    fn kind(&self) -> EngineKind {
        EngineKind::Quantile
    }

    fn forecast(
        &self,
        training: &TrainingSet,
        targets: &TargetSet,
    ) -> Result<PredictionTable, ModelError> {
        check_columns(training, targets)?;
        let median = resolve_median(&self.quantiles)
            .ok_or_else(|| ModelError::UnresolvableMedian(self.quantiles.clone()))?;
        debug!(
            "Training {} quantile models on {} rows",
            self.profiles.len() * self.quantiles.len(),
            training.features.len()
        );

        let parameters = self
            .profiles
            .iter()
            .map(|profile| self.forecast_parameter(profile, training, targets, median))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PredictionTable {
            datetimes: targets.datetimes.clone(),
            parameters,
        })
    }
}
