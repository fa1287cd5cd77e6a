//! NASA POWER hourly point API as a [`HistorySource`].

use crate::history::error::FetchError;
use crate::history::fetch::HistorySource;
use crate::history::table::{HistoricalRecord, HistoricalTable};
use crate::types::calendar::DateWindow;
use crate::types::location::LatLon;
use chrono::NaiveDateTime;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const POWER_HOURLY_URL: &str = "https://power.larc.nasa.gov/api/temporal/hourly/point";
const DEFAULT_FILL_VALUE: f64 = -999.0;

#[derive(Debug, Deserialize)]
pub struct PowerResponse {
    #[serde(default)]
    header: Option<PowerHeader>,
    properties: Option<PowerProperties>,
}

#[derive(Debug, Deserialize)]
struct PowerHeader {
    fill_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: Option<HashMap<String, BTreeMap<String, Option<f64>>>>,
}

/// Client for `power.larc.nasa.gov` hourly point data (community `RE`, JSON format).
#[derive(Debug, Clone)]
pub struct PowerSource {
    client: Client,
    base_url: String,
}

impl Default for PowerSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerSource {
    pub fn new() -> Self {
        Self::with_base_url(POWER_HOURLY_URL)
    }

    /// Points the client at a different endpoint with the same API, e.g. a mirror.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    fn url(&self, location: LatLon, window: DateWindow, parameters: &[String]) -> String {
        format!(
            "{}?start={}&end={}&latitude={}&longitude={}&parameters={}&format=JSON&community=RE",
            self.base_url,
            window.start.format("%Y%m%d"),
            window.end.format("%Y%m%d"),
            location.lat(),
            location.lon(),
            parameters.join(",")
        )
    }

    async fn get(&self, url: String) -> Result<PowerResponse, FetchError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    FetchError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    FetchError::NetworkRequest(url, e)
                });
            }
        };

        response
            .json::<PowerResponse>()
            .await
            .map_err(|e| FetchError::MalformedResponse {
                url,
                message: e.to_string(),
            })
    }
}

impl HistorySource for PowerSource {
    async fn fetch_window(
        &self,
        location: LatLon,
        window: DateWindow,
        parameters: &[String],
    ) -> Result<HistoricalTable, FetchError> {
        let url = self.url(location, window, parameters);
        debug!("Requesting {}", url);
        let body = self.get(url.clone()).await?;
        parse_power_response(&url, body, parameters)
    }
}

/// Converts a POWER response into a [`HistoricalTable`].
///
/// Keys are `YYYYMMDDHH` timestamps. The fill value (−999 unless the header says
/// otherwise) is treated as missing, and rows where every parameter is missing are dropped.
pub fn parse_power_response(
    url: &str,
    body: PowerResponse,
    parameters: &[String],
) -> Result<HistoricalTable, FetchError> {
    let malformed = |message: String| FetchError::MalformedResponse {
        url: url.to_string(),
        message,
    };
    let fill_value = body
        .header
        .and_then(|h| h.fill_value)
        .unwrap_or(DEFAULT_FILL_VALUE);
    let series = body
        .properties
        .and_then(|p| p.parameter)
        .ok_or_else(|| malformed("response missing 'properties.parameter'".to_string()))?;

    let mut per_parameter = Vec::with_capacity(parameters.len());
    for name in parameters {
        let values = series
            .get(name)
            .ok_or_else(|| malformed(format!("response missing parameter '{name}'")))?;
        per_parameter.push(values);
    }

    let keys: BTreeSet<&String> = per_parameter.iter().flat_map(|s| s.keys()).collect();
    let mut records = Vec::with_capacity(keys.len());
    for key in keys {
        let datetime = parse_hour_key(key)
            .ok_or_else(|| malformed(format!("unparseable timestamp key '{key}'")))?;
        let values: Vec<Option<f64>> = per_parameter
            .iter()
            .map(|s| {
                s.get(key)
                    .copied()
                    .flatten()
                    .filter(|v| v.is_finite() && (v - fill_value).abs() > f64::EPSILON)
            })
            .collect();
        if values.iter().all(Option::is_none) {
            continue;
        }
        records.push(HistoricalRecord::new(datetime, values));
    }

    Ok(HistoricalTable::from_records(parameters, &records)?)
}

fn parse_hour_key(key: &str) -> Option<NaiveDateTime> {
    if key.len() != 10 {
        return None;
    }
    NaiveDateTime::parse_from_str(&format!("{key}00"), "%Y%m%d%H%M").ok()
}
