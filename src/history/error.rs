use chrono::NaiveDate;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("No historical observations found around {date} in the {years_back} years before it")]
    Empty { date: NaiveDate, years_back: u32 },

    #[error(transparent)]
    Frame(#[from] AggregateError),
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Missing required column '{0}'")]
    MissingColumn(String),

    #[error("Record at {datetime} has {found} values, expected {expected}")]
    RecordWidth {
        datetime: chrono::NaiveDateTime,
        expected: usize,
        found: usize,
    },

    #[error("Column '{column}' holds an unexpected type: {dtype}")]
    UnexpectedType { column: String, dtype: String },
}
