use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse configuration")]
    Parse(#[from] toml::de::Error),

    #[error("No parameters configured")]
    NoParameters,

    #[error("Parameter '{0}' is configured more than once")]
    DuplicateParameter(String),

    #[error("Quantile {0} must lie strictly between 0 and 1")]
    QuantileOutOfRange(f64),

    #[error("Quantiles must be strictly ascending, found {previous} before {next}")]
    QuantilesNotAscending { previous: f64, next: f64 },

    #[error("Quantile list {0:?} contains neither 0.5 nor a pair symmetric around it")]
    NoMedianQuantile(Vec<f64>),

    #[error("Confidence level {0} must lie strictly between 0 and 1")]
    LevelOutOfRange(f64),

    #[error("Confidence level {level} maps to ({low}, {high}), which is not a symmetric percentile pair")]
    AsymmetricMapping { level: f64, low: f64, high: f64 },

    #[error("Threshold '{label}' for {parameter} has lower bound {lower} above upper bound {upper}")]
    InvertedRange {
        parameter: String,
        label: String,
        lower: f64,
        upper: f64,
    },

    #[error("Thresholds '{previous}' and '{next}' for {parameter} overlap")]
    OverlappingRanges {
        parameter: String,
        previous: String,
        next: String,
    },

    #[error("Thresholds '{previous}' (up to {upper}) and '{next}' (from {lower}) for {parameter} leave a gap")]
    GappedRanges {
        parameter: String,
        previous: String,
        next: String,
        upper: f64,
        lower: f64,
    },

    #[error("Bootstrap ensemble needs at least one member")]
    NoBootstrapMembers,

    #[error("Invalid model settings for {parameter}: {reason}")]
    InvalidModel { parameter: String, reason: String },
}
