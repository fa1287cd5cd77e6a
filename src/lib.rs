pub mod bands;
pub mod classify;
pub mod config;
pub mod engine;
mod error;
pub mod features;
mod forecaster;
pub mod history;
pub mod model;
mod summary;
mod types;

pub use error::ForecastError;
pub use forecaster::*;
pub use summary::DailySummary;

pub use types::calendar::{AggregateKey, DateWindow, HORIZON_HOURS};
pub use types::location::LatLon;

pub use bands::{BandAssembler, BandColumn, BandRole, BandTable};
pub use classify::{
    find_extrema, ClassificationBand, ExtremaMarker, ExtremumKind, ThresholdClassifier,
};
pub use config::confidence::CiMapping;
pub use config::parameter::ParameterProfile;
pub use config::thresholds::{ThresholdRange, ThresholdTable};
pub use config::{BootstrapSettings, ForecastConfig};
pub use engine::{
    BootstrapForecastEnsemble, EngineKind, ForecastEngine, ParameterForecast, PredictionTable,
    QuantileForecastEnsemble, QuantileSeries,
};
pub use features::{FeatureBuilder, TargetSet, TrainingSet};
pub use history::aggregator::{AggregateTable, HistoricalAggregator, ParameterStats};
pub use history::fetch::{fetch_history, HistorySource};
pub use history::power::PowerSource;
pub use history::table::{HistoricalRecord, HistoricalTable};
pub use model::transform::Transform;
pub use model::ModelFamily;

pub use config::error::ConfigError;
pub use history::error::{AggregateError, FetchError};
pub use model::error::ModelError;
