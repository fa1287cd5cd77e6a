//! Forecast engines and the prediction table they share.
//!
//! Both [`QuantileForecastEnsemble`] and [`BootstrapForecastEnsemble`] turn a
//! [`TrainingSet`] and the 24-hour [`TargetSet`] into a [`PredictionTable`]: one
//! point series plus a set of percentile series per parameter.

pub mod bootstrap;
pub mod quantile;

pub use bootstrap::BootstrapForecastEnsemble;
pub use quantile::QuantileForecastEnsemble;

use crate::config::ForecastConfig;
use crate::features::{TargetSet, TrainingSet};
use crate::history::table::DATETIME;
use crate::model::error::ModelError;
use chrono::NaiveDateTime;
use log::warn;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which ensemble produces the forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// One pinball-loss model per (parameter, quantile).
    #[default]
    Quantile,
    /// Resampled ensemble of joint regressors.
    Bootstrap,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Quantile => write!(f, "quantile"),
            EngineKind::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

pub trait ForecastEngine {
    fn kind(&self) -> EngineKind;

    /// Trains on `training` and predicts every row of `targets`.
    ///
    /// # Errors
    ///
    /// [`ModelError::NoFiniteTargets`] when a parameter has nothing to train on, and
    /// [`ModelError::FeatureColumnsDiffer`] when the two feature matrices disagree.
    fn forecast(
        &self,
        training: &TrainingSet,
        targets: &TargetSet,
    ) -> Result<PredictionTable, ModelError>;
}

/// Builds the engine selected by `kind`, configured from `config`.
pub fn build_engine(kind: EngineKind, config: &ForecastConfig) -> Box<dyn ForecastEngine> {
    match kind {
        EngineKind::Quantile => Box::new(QuantileForecastEnsemble::new(config)),
        EngineKind::Bootstrap => Box::new(BootstrapForecastEnsemble::new(config)),
    }
}

/// Predicted values at one percentile (`0..=100`), one per target hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantileSeries {
    pub percentile: f64,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterForecast {
    pub parameter: String,
    /// Median (quantile engine) or member mean (bootstrap engine).
    pub point: Vec<f64>,
    /// Ascending by percentile.
    pub quantiles: Vec<QuantileSeries>,
}

impl ParameterForecast {
    /// Number of hours where some higher percentile predicts below a lower one.
    pub fn crossings(&self) -> usize {
        count_crossings(&self.quantiles)
    }

    pub fn series(&self, percentile: f64) -> Option<&QuantileSeries> {
        self.quantiles
            .iter()
            .find(|q| (q.percentile - percentile).abs() < 1e-9)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionTable {
    pub datetimes: Vec<NaiveDateTime>,
    pub parameters: Vec<ParameterForecast>,
}

impl PredictionTable {
    /// A table with timestamps only, the result of forecasting from no history.
    pub fn skeleton(datetimes: Vec<NaiveDateTime>) -> Self {
        Self {
            datetimes,
            parameters: Vec::new(),
        }
    }

    pub fn is_skeleton(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.datetimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datetimes.is_empty()
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterForecast> {
        self.parameters.iter().find(|p| p.parameter == name)
    }

    /// Parameters whose percentile series cross, with the number of affected hours.
    pub fn crossings(&self) -> Vec<(&str, usize)> {
        self.parameters
            .iter()
            .map(|p| (p.parameter.as_str(), p.crossings()))
            .filter(|(_, n)| *n > 0)
            .collect()
    }

    /// `datetime`, then per parameter `P` and `P_p<percentile>` columns.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> =
            vec![Series::new(DATETIME.into(), self.datetimes.as_slice()).into()];
        for forecast in &self.parameters {
            let point = Series::new(forecast.parameter.as_str().into(), forecast.point.as_slice());
            columns.push(point.into());
            for q in &forecast.quantiles {
                let name = format!("{}_p{}", forecast.parameter, q.percentile);
                columns.push(Series::new(name.into(), q.values.as_slice()).into());
            }
        }
        DataFrame::new(columns)
    }
}

pub(crate) fn check_columns(training: &TrainingSet, targets: &TargetSet) -> Result<(), ModelError> {
    if training.features.columns != targets.features.columns {
        return Err(ModelError::FeatureColumnsDiffer {
            training: training.features.columns.len(),
            prediction: targets.features.columns.len(),
        });
    }
    Ok(())
}

/// `τ` as a percentile, rounded so that e.g. `0.05` labels as `5` rather than `5.000000000000001`.
pub(crate) fn tau_to_percentile(tau: f64) -> f64 {
    (tau * 100.0 * 1e6).round() / 1e6
}

pub(crate) fn count_crossings(series: &[QuantileSeries]) -> usize {
    let hours = series.first().map_or(0, |s| s.values.len());
    (0..hours)
        .filter(|&h| series.windows(2).any(|w| w[1].values[h] < w[0].values[h]))
        .count()
}

/// Counts the hours where `series` cross and warns about them. With `sort_crossings` the
/// crossing hours are rearranged; otherwise the series are left untouched.
///
/// Returns the number of crossing hours before any rearrangement.
pub(crate) fn settle_crossings(
    parameter: &str,
    series: &mut [QuantileSeries],
    sort_crossings: bool,
) -> usize {
    let crossings = count_crossings(series);
    if crossings > 0 {
        let hours = series.first().map_or(0, |s| s.values.len());
        warn!(
            "Quantile forecasts for {} cross in {} of {} hours{}",
            parameter,
            crossings,
            hours,
            if sort_crossings { ", rearranging" } else { "" }
        );
        if sort_crossings {
            rearrange(series);
        }
    }
    crossings
}

/// Sorts the values of every hour across the percentile series (monotone rearrangement).
pub(crate) fn rearrange(series: &mut [QuantileSeries]) {
    let hours = series.first().map_or(0, |s| s.values.len());
    let mut column = Vec::with_capacity(series.len());
    for h in 0..hours {
        column.clear();
        column.extend(series.iter().map(|s| s.values[h]));
        column.sort_by(|a, b| a.total_cmp(b));
        for (s, value) in series.iter_mut().zip(&column) {
            s.values[h] = *value;
        }
    }
}
