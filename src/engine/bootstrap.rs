use crate::config::confidence::CiMapping;
use crate::config::parameter::ParameterProfile;
use crate::config::{BootstrapSettings, ForecastConfig};
use crate::engine::{
    check_columns, tau_to_percentile, EngineKind, ForecastEngine, ParameterForecast,
    PredictionTable, QuantileSeries,
};
use crate::features::{TargetSet, TrainingSet};
use crate::model::booster::{BoosterParams, GradientBooster, Loss};
use crate::model::error::ModelError;
use crate::model::stats::{mean, percentile_of_sorted, sorted_finite};
use crate::model::ModelFamily;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// K bootstrap resamples of the history, each fitting one squared-loss booster per
/// parameter. The point forecast is the member mean; interval bounds are empirical
/// percentiles of the member predictions for each hour.
#[derive(Debug, Clone)]
pub struct BootstrapForecastEnsemble {
    profiles: Vec<ParameterProfile>,
    settings: BootstrapSettings,
    ci_levels: Vec<f64>,
    confidence: CiMapping,
}

impl BootstrapForecastEnsemble {
    pub fn new(config: &ForecastConfig) -> Self {
        Self {
            profiles: config.parameters().to_vec(),
            settings: *config.bootstrap(),
            ci_levels: config.ci_levels().to_vec(),
            confidence: config.confidence().clone(),
        }
    }

    fn member_params(&self, profile: &ParameterProfile) -> BoosterParams {
        match profile.model {
            ModelFamily::Climatology => profile.model.booster_params(),
            ModelFamily::Boosted(_) => self.settings.model,
        }
    }

    /// Ascending, de-duplicated percentiles needed for every configured level.
    fn percentiles(&self) -> Vec<f64> {
        let mut percentiles: Vec<f64> = self
            .ci_levels
            .iter()
            .flat_map(|&level| {
                let pair = self.confidence.percentiles(level);
                [pair.low, pair.high]
            })
            .map(|p| tau_to_percentile(p / 100.0))
            .collect();
        percentiles.sort_by(|a, b| a.total_cmp(b));
        percentiles.dedup();
        percentiles
    }
}

impl ForecastEngine for BootstrapForecastEnsemble {
    fn kind(&self) -> EngineKind {
        EngineKind::Bootstrap
    }

    fn forecast(
        &self,
        training: &TrainingSet,
        targets: &TargetSet,
    ) -> Result<PredictionTable, ModelError> {
        if training.is_empty() {
            info!("No historical rows, returning an empty forecast skeleton");
            return Ok(PredictionTable::skeleton(targets.datetimes.clone()));
        }
        check_columns(training, targets)?;

        let transformed = self
            .profiles
            .iter()
            .map(|profile| {
                let raw = training
                    .target(&profile.name)
                    .ok_or_else(|| ModelError::MissingTarget(profile.name.clone()))?;
                let y = profile.transform.forward_all(raw);
                if y.iter().any(|v| v.is_finite()) {
                    Ok(y)
                } else {
                    Err(ModelError::NoFiniteTargets(profile.name.clone()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rows = training.features.row_slices();
        let n = rows.len();
        debug!(
            "Training {} bootstrap members over {} rows and {} parameters",
            self.settings.members,
            n,
            self.profiles.len()
        );

        // member_predictions[parameter][member][hour]
        let mut member_predictions: Vec<Vec<Vec<f64>>> = vec![Vec::new(); self.profiles.len()];
        for member in 0..self.settings.members {
            let mut rng = StdRng::seed_from_u64(self.settings.seed.wrapping_add(member as u64));
            let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
            let sample_rows: Vec<&[f64]> = sample.iter().map(|&i| rows[i]).collect();

            for (p, profile) in self.profiles.iter().enumerate() {
                let y: Vec<f64> = sample.iter().map(|&i| transformed[p][i]).collect();
                let booster = match GradientBooster::fit(
                    &self.member_params(profile),
                    Loss::Squared,
                    &sample_rows,
                    &y,
                ) {
                    Ok(booster) => booster,
                    Err(ModelError::EmptyTrainingSet) => {
                        warn!(
                            "Bootstrap member {} drew no finite {} targets, skipping it",
                            member, profile.name
                        );
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let predicted = booster.predict(&targets.features.rows);
                member_predictions[p].push(profile.transform.inverse_all(&predicted));
            }
        }

        let percentiles = self.percentiles();
        let hours = targets.datetimes.len();
        let mut parameters = Vec::with_capacity(self.profiles.len());
        for (profile, members) in self.profiles.iter().zip(&member_predictions) {
            if members.is_empty() {
                return Err(ModelError::NoFiniteTargets(profile.name.clone()));
            }
            let per_hour: Vec<Vec<f64>> = (0..hours)
                .map(|h| sorted_finite(members.iter().map(|m| m[h])))
                .collect();
            let point = per_hour
                .iter()
                .map(|values| mean(values).unwrap_or(f64::NAN))
                .collect();
            let quantiles = percentiles
                .iter()
                .map(|&percentile| QuantileSeries {
                    percentile,
                    values: per_hour
                        .iter()
                        .map(|values| percentile_of_sorted(values, percentile).unwrap_or(f64::NAN))
                        .collect(),
                })
                .collect();
            parameters.push(ParameterForecast {
                parameter: profile.name.clone(),
                point,
                quantiles,
            });
        }

        Ok(PredictionTable {
            datetimes: targets.datetimes.clone(),
            parameters,
        })
    }
}
