//! The forecasting client: fetches the analog history for a location and date,
//! then runs aggregation, feature building, the selected ensemble, band assembly,
//! classification and the daily summary.

use crate::bands::{BandAssembler, BandTable};
use crate::classify::{find_extrema, ClassificationBand, ExtremaMarker, ThresholdClassifier};
use crate::config::ForecastConfig;
use crate::engine::{build_engine, EngineKind, PredictionTable};
use crate::error::ForecastError;
use crate::features::FeatureBuilder;
use crate::history::aggregator::HistoricalAggregator;
use crate::history::fetch::{fetch_history, HistorySource};
use crate::history::table::HistoricalTable;
use crate::summary::DailySummary;
use crate::types::location::LatLon;
use bon::bon;
use chrono::NaiveDate;
use log::{info, warn};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

const DEFAULT_WINDOW_DAYS: u32 = 5;
const DEFAULT_YEARS_BACK: u32 = 10;

/// Everything produced for one target day, independent of where the history came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub engine: EngineKind,
    #[serde(skip)]
    pub predictions: PredictionTable,
    pub bands: BandTable,
    pub summary: DailySummary,
    /// Severity bands of the point series, for parameters with a threshold table.
    pub classifications: BTreeMap<String, Vec<ClassificationBand>>,
    pub extrema: BTreeMap<String, Vec<ExtremaMarker>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    pub location: LatLon,
    #[serde(flatten)]
    pub forecast: DayForecast,
}

impl ForecastReport {
    /// The band table as a Polars frame, `datetime` first.
    pub fn band_frame(&self) -> Result<DataFrame, ForecastError> {
        self.forecast
            .bands
            .to_dataframe()
            .map_err(ForecastError::BandFrame)
    }
}

/// Runs the CPU-bound part of a forecast on an already fetched history.
///
/// # Errors
///
/// [`ForecastError::Aggregate`] when the history frame cannot be grouped and
/// [`ForecastError::Model`] when an engine cannot train a parameter.
pub fn run_pipeline(
    history: &HistoricalTable,
    date: NaiveDate,
    config: &ForecastConfig,
    engine: EngineKind,
) -> Result<DayForecast, ForecastError> {
    let parameters = config.parameter_names();
    let aggregates = HistoricalAggregator::new(&parameters).aggregate(history)?;

    let builder = FeatureBuilder::new(&aggregates);
    let training = builder.training(&history.observations()?);
    let targets = builder.targets(date);

    let engine = build_engine(engine, config);
    let predictions = engine.forecast(&training, &targets)?;
    for (parameter, crossings) in predictions.crossings() {
        if crossings > 0 {
            warn!(
                "{} hour(s) of {} have crossing quantiles in the final forecast",
                crossings, parameter
            );
        }
    }

    let bands = BandAssembler::from_config(config).assemble(&predictions);
    let summary = DailySummary::from_predictions(&predictions, config.parameters());

    let mut classifications = BTreeMap::new();
    let mut extrema = BTreeMap::new();
    for forecast in &predictions.parameters {
        extrema.insert(
            forecast.parameter.clone(),
            find_extrema(&predictions.datetimes, &forecast.point),
        );
        let Some(profile) = config.parameter(&forecast.parameter) else {
            continue;
        };
        if profile.thresholds.is_empty() {
            continue;
        }
        let segments = ThresholdClassifier::new(&profile.thresholds)
            .segment(&predictions.datetimes, &forecast.point);
        classifications.insert(forecast.parameter.clone(), segments);
    }

    Ok(DayForecast {
        date,
        engine: engine.kind(),
        predictions,
        bands,
        summary,
        classifications,
        extrema,
    })
}

/// Probabilistic day-ahead forecaster over a [`HistorySource`].
///
/// # Examples
///
/// ```rust,no_run
/// # use meteocast::{ForecastConfig, ForecastError, Forecaster, LatLon, PowerSource};
/// # use chrono::NaiveDate;
/// # use std::sync::Arc;
/// # #[tokio::main]
/// # async fn main() -> Result<(), ForecastError> {
/// let forecaster = Forecaster::new(PowerSource::new(), Arc::new(ForecastConfig::builtin()?));
/// let report = forecaster
///     .forecast()
///     .location(LatLon(10.8231, 106.6297))
///     .date(NaiveDate::from_ymd_opt(2025, 10, 2).unwrap())
///     .call()
///     .await?;
/// println!("{}", report.band_frame()?);
/// # Ok(())
/// # }
/// ```
pub struct Forecaster<S: HistorySource> {
    source: S,
    config: Arc<ForecastConfig>,
}

#[bon]
impl<S: HistorySource> Forecaster<S> {
    pub fn new(source: S, config: Arc<ForecastConfig>) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Forecasts the 24 hours of `date` at `location`.
    ///
    /// This method uses a builder pattern.
    ///
    /// # Arguments
    ///
    /// * `.location(LatLon)`: **Required.**
    /// * `.date(NaiveDate)`: **Required.** The day to forecast.
    /// * `.window_days(u32)`: Optional. Half-width of the anniversary window. Defaults to `5`.
    /// * `.years_back(u32)`: Optional. Number of past years to fetch. Defaults to `10`.
    /// * `.engine(EngineKind)`: Optional. Defaults to the configured engine.
    ///
    /// # Errors
    ///
    /// [`ForecastError::Fetch`] if any yearly window fails to download or nothing came back,
    /// plus every error of [`run_pipeline`].
    #[builder]
    pub async fn forecast(
        &self,
        location: LatLon,
        date: NaiveDate,
        window_days: Option<u32>,
        years_back: Option<u32>,
        engine: Option<EngineKind>,
    ) -> Result<ForecastReport, ForecastError> {
        let window_days = window_days.unwrap_or(DEFAULT_WINDOW_DAYS);
        let years_back = years_back.unwrap_or(DEFAULT_YEARS_BACK);
        let engine = engine.unwrap_or(self.config.engine());

        let parameters = self.config.parameter_names();
        let history = fetch_history(
            &self.source,
            location,
            date,
            window_days,
            years_back,
            &parameters,
        )
        .await?;

        let config = Arc::clone(&self.config);
        let forecast =
            tokio::task::spawn_blocking(move || run_pipeline(&history, date, &config, engine))
                .await??;
        info!("Forecast for {} at {} ready ({} engine)", date, location, engine);

        Ok(ForecastReport { location, forecast })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::error::FetchError;
    use crate::history::table::HistoricalRecord;
    use crate::types::calendar::{AggregateKey, DateWindow};
    use chrono::{Datelike, Timelike};

    const CONFIG: &str = r#"
        quantiles = [0.05, 0.2, 0.35, 0.5, 0.65, 0.8, 0.95]
        ci_levels = [0.3, 0.6, 0.9]

        [bootstrap]
        members = 4
        model = { n_estimators = 10, learning_rate = 0.1, max_depth = 2 }

        [[parameter]]
        name = "T2M"
        model = { family = "boosted", n_estimators = 20, learning_rate = 0.1, max_depth = 2 }
        thresholds = [
            { label = "Cold", lower = -50.0, upper = 15.0, color = "blue" },
            { label = "Warm", lower = 15.0, upper = 60.0, color = "red" },
        ]
    "#;

    /// Synthetic diurnal temperatures for hours 0..=20 of every window day.
    struct DiurnalSource;

    impl HistorySource for DiurnalSource {
        async fn fetch_window(
            &self,
            _location: LatLon,
            window: DateWindow,
            parameters: &[String],
        ) -> Result<HistoricalTable, FetchError> {
            let records: Vec<HistoricalRecord> = window
                .start
                .iter_days()
                .take_while(|d| *d <= window.end)
                .flat_map(|d| {
                    (0..=20u32).map(move |hour| {
                        let wobble = ((d.year() + d.ordinal() as i32) % 5) as f64 - 2.0;
                        let value = 10.0 + 8.0 * (hour as f64 / 20.0 * 3.1).sin() + wobble;
                        HistoricalRecord::new(d.and_hms_opt(hour, 0, 0).unwrap(), vec![Some(value)])
                    })
                })
                .collect();
            Ok(HistoricalTable::from_records(parameters, &records)?)
        }
    }

    fn target_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 2).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_quantile_forecast() -> Result<(), Box<dyn std::error::Error>> {
        let config = Arc::new(ForecastConfig::from_toml_str(CONFIG)?);
        let parameters = config.parameter_names();

        let history =
            fetch_history(&DiurnalSource, LatLon(10.8, 106.6), target_date(), 5, 10, &parameters)
                .await?;
        assert_eq!(history.len(), 10 * 11 * 21);
        let aggregates = HistoricalAggregator::new(&parameters).aggregate(&history)?;
        assert!(aggregates.len() <= 264);
        let target_keys = aggregates
            .keys()
            .filter(|k| (k.month, k.day) == (10, 2))
            .count();
        assert!(target_keys <= 24);
        assert!(aggregates.get(&AggregateKey::new(10, 2, 23)).is_none());

        let forecaster = Forecaster::new(DiurnalSource, Arc::clone(&config));
        let report = forecaster
            .forecast()
            .location(LatLon(10.8, 106.6))
            .date(target_date())
            .call()
            .await?;

        let forecast = &report.forecast;
        assert_eq!(forecast.engine, EngineKind::Quantile);
        assert_eq!(forecast.predictions.len(), 24);
        let temperature = forecast.predictions.parameter("T2M").unwrap();
        assert_eq!(temperature.quantiles.len(), 7);

        assert_eq!(
            forecast.bands.column_names(),
            [
                "T2M",
                "T2M_low_30",
                "T2M_high_30",
                "T2M_low_60",
                "T2M_high_60",
                "T2M_low_90",
                "T2M_high_90"
            ]
        );
        assert_eq!(forecast.bands.len(), 25);
        assert_eq!(forecast.bands.datetimes[0].hour(), 0);
        assert_eq!(report.band_frame()?.shape(), (25, 8));

        assert!(forecast.summary.get("T2M_mean").is_some());
        assert!(forecast.summary.get("T2M_total").is_none());
        let segments = &forecast.classifications["T2M"];
        assert!(!segments.is_empty());
        assert_eq!(segments[0].start_index, 0);
        assert_eq!(segments.last().unwrap().end_index, 23);
        assert!(forecast.extrema.contains_key("T2M"));
        Ok(())
    }

    #[tokio::test]
    async fn test_engine_override_and_window() -> Result<(), Box<dyn std::error::Error>> {
        let config = Arc::new(ForecastConfig::from_toml_str(CONFIG)?);
        let forecaster = Forecaster::new(DiurnalSource, config);
        let report = forecaster
            .forecast()
            .location(LatLon(10.8, 106.6))
            .date(target_date())
            .window_days(2)
            .years_back(3)
            .engine(EngineKind::Bootstrap)
            .call()
            .await?;
        assert_eq!(report.forecast.engine, EngineKind::Bootstrap);
        assert_eq!(report.forecast.bands.len(), 25);
        assert_eq!(report.forecast.bands.columns.len(), 7);
        Ok(())
    }

    #[test]
    fn test_empty_history_bootstrap_skeleton() -> Result<(), Box<dyn std::error::Error>> {
        let config = ForecastConfig::from_toml_str(CONFIG)?;
        let history = HistoricalTable::empty(&config.parameter_names())?;
        let forecast = run_pipeline(&history, target_date(), &config, EngineKind::Bootstrap)?;

        assert!(forecast.predictions.is_skeleton());
        assert_eq!(forecast.bands.len(), 25);
        assert!(forecast.bands.columns.is_empty());
        assert!(forecast.summary.is_empty());
        assert!(forecast.classifications.is_empty());
        Ok(())
    }

    #[test]
    fn test_empty_history_quantile_fails() -> Result<(), Box<dyn std::error::Error>> {
        let config = ForecastConfig::from_toml_str(CONFIG)?;
        let history = HistoricalTable::empty(&config.parameter_names())?;
        let result = run_pipeline(&history, target_date(), &config, EngineKind::Quantile);
        assert!(matches!(result, Err(ForecastError::Model(_))));
        Ok(())
    }
}
