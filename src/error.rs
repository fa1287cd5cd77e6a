use crate::config::error::ConfigError;
use crate::history::error::{AggregateError, FetchError};
use crate::model::error::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Failed building the band table frame")]
    BandFrame(#[source] polars::error::PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
