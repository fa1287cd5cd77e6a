//! Reduction of raw observations into per-(month, day, hour) statistics.

use crate::history::error::AggregateError;
use crate::history::table::{HistoricalTable, DATETIME};
use crate::types::calendar::AggregateKey;
use log::debug;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

const KEY_MONTH: &str = "key_month";
const KEY_DAY: &str = "key_day";
const KEY_HOUR: &str = "key_hour";

/// Summary statistics of one parameter under one key, over non-missing samples only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ParameterStats {
    pub mean: Option<f64>,
    /// Sample standard deviation (ddof = 1); `None` with fewer than two samples.
    pub std: Option<f64>,
    pub median: Option<f64>,
    pub p5: Option<f64>,
    pub p95: Option<f64>,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    /// One entry per parameter, in the table's parameter order.
    pub stats: Vec<ParameterStats>,
}

/// Aggregated history. Only keys actually observed are present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateTable {
    parameters: Vec<String>,
    rows: BTreeMap<AggregateKey, AggregateRow>,
}

impl AggregateTable {
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &AggregateKey) -> Option<&AggregateRow> {
        self.rows.get(key)
    }

    pub fn stats(&self, key: &AggregateKey, parameter: &str) -> Option<&ParameterStats> {
        let index = self.parameters.iter().position(|p| p == parameter)?;
        self.rows.get(key).and_then(|row| row.stats.get(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AggregateKey, &AggregateRow)> {
        self.rows.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &AggregateKey> {
        self.rows.keys()
    }
}

/// Groups a [`HistoricalTable`] by (month, day, hour) and summarises every parameter.
#[derive(Debug, Clone)]
pub struct HistoricalAggregator {
    parameters: Vec<String>,
}

impl HistoricalAggregator {
    pub fn new(parameters: &[String]) -> Self {
        Self {
            parameters: parameters.to_vec(),
        }
    }

    /// Computes mean, std, median, p5, p95 and count per key and parameter.
    ///
    /// # Errors
    ///
    /// [`AggregateError::MissingColumn`] when a parameter column is absent, and
    /// [`AggregateError::DataFrameProcessing`] for any Polars failure.
    pub fn aggregate(&self, table: &HistoricalTable) -> Result<AggregateTable, AggregateError> {
        for name in std::iter::once(DATETIME).chain(self.parameters.iter().map(String::as_str)) {
            if table.frame.column(name).is_err() {
                return Err(AggregateError::MissingColumn(name.to_string()));
            }
        }

        let mut aggregations = Vec::with_capacity(self.parameters.len() * 6);
        for p in &self.parameters {
            let values = || col(p.as_str()).cast(DataType::Float64);
            aggregations.push(values().mean().alias(format!("{p}_mean")));
            aggregations.push(values().std(1).alias(format!("{p}_std")));
            aggregations.push(values().median().alias(format!("{p}_median")));
            aggregations.push(
                values()
                    .quantile(lit(0.05), QuantileMethod::Linear)
                    .alias(format!("{p}_p5")),
            );
            aggregations.push(
                values()
                    .quantile(lit(0.95), QuantileMethod::Linear)
                    .alias(format!("{p}_p95")),
            );
            aggregations.push(
                values()
                    .count()
                    .cast(DataType::UInt32)
                    .alias(format!("{p}_count")),
            );
        }

        let grouped = table
            .frame
            .clone()
            .lazy()
            .with_columns([
                col(DATETIME).dt().month().cast(DataType::UInt32).alias(KEY_MONTH),
                col(DATETIME).dt().day().cast(DataType::UInt32).alias(KEY_DAY),
                col(DATETIME).dt().hour().cast(DataType::UInt32).alias(KEY_HOUR),
            ])
            .group_by([col(KEY_MONTH), col(KEY_DAY), col(KEY_HOUR)])
            .agg(aggregations)
            .collect()?;

        let months = u32_values(&grouped, KEY_MONTH)?;
        let days = u32_values(&grouped, KEY_DAY)?;
        let hours = u32_values(&grouped, KEY_HOUR)?;

        let mut per_parameter = Vec::with_capacity(self.parameters.len());
        for p in &self.parameters {
            per_parameter.push((
                f64_values(&grouped, &format!("{p}_mean"))?,
                f64_values(&grouped, &format!("{p}_std"))?,
                f64_values(&grouped, &format!("{p}_median"))?,
                f64_values(&grouped, &format!("{p}_p5"))?,
                f64_values(&grouped, &format!("{p}_p95"))?,
                u32_values(&grouped, &format!("{p}_count"))?,
            ));
        }

        let mut rows = BTreeMap::new();
        for i in 0..grouped.height() {
            let (Some(month), Some(day), Some(hour)) = (months[i], days[i], hours[i]) else {
                continue;
            };
            let stats = per_parameter
                .iter()
                .map(|(mean, std, median, p5, p95, count)| {
                    let count = count[i].unwrap_or(0);
                    ParameterStats {
                        mean: mean[i],
                        std: if count > 1 { std[i] } else { None },
                        median: median[i],
                        p5: p5[i],
                        p95: p95[i],
                        count,
                    }
                })
                .collect();
            rows.insert(AggregateKey::new(month, day, hour), AggregateRow { stats });
        }

        debug!(
            "Aggregated {} historical rows into {} (month, day, hour) keys",
            table.len(),
            rows.len()
        );

        Ok(AggregateTable {
            parameters: self.parameters.clone(),
            rows,
        })
    }
}

fn u32_values(frame: &DataFrame, name: &str) -> Result<Vec<Option<u32>>, AggregateError> {
    let column = frame
        .column(name)
        .map_err(|_| AggregateError::MissingColumn(name.to_string()))?
        .cast(&DataType::UInt32)?;
    Ok(column.u32()?.into_iter().collect())
}

fn f64_values(frame: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, AggregateError> {
    let column = frame
        .column(name)
        .map_err(|_| AggregateError::MissingColumn(name.to_string()))?
        .cast(&DataType::Float64)?;
    Ok(column
        .f64()?
        .into_iter()
        .map(|v| v.filter(|v| v.is_finite()))
        .collect())
}
