//! Cyclical time encodings merged with aggregate lookups.
//!
//! Training rows look up the aggregate row of their own (month, day, hour) key.
//! Forecast-target rows degrade from the exact key to the (month, hour) average
//! over all observed days, and finally to all zeros.

use crate::history::aggregator::{AggregateTable, ParameterStats};
use crate::history::table::Observations;
use crate::types::calendar::{hours_of_day, AggregateKey};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::f64::consts::TAU;

pub const TIME_FEATURES: [&str; 4] = ["sin_hour", "cos_hour", "sin_doy", "cos_doy"];
pub const STAT_SUFFIXES: [&str; 6] = ["mean", "std", "median", "p5", "p95", "count"];

const DAYS_PER_YEAR: f64 = 365.25;
const HOURS_PER_DAY: f64 = 24.0;

/// `[mean, std, median, p5, p95, count]` of one parameter.
pub type StatVector = [f64; STAT_SUFFIXES.len()];

/// Dense row-major feature matrix with its column names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_slices(&self) -> Vec<&[f64]> {
        self.rows.iter().map(Vec::as_slice).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Historical rows ready for training: features plus one target vector per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub datetimes: Vec<NaiveDateTime>,
    pub features: FeatureMatrix,
    /// Per parameter, aligned with `features.rows`; NaN marks a missing observation.
    pub targets: Vec<Vec<f64>>,
    parameters: Vec<String>,
}

impl TrainingSet {
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn target(&self, parameter: &str) -> Option<&[f64]> {
        let index = self.parameters.iter().position(|p| p == parameter)?;
        self.targets.get(index).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// The 24 hours of the forecast day.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSet {
    pub datetimes: Vec<NaiveDateTime>,
    pub features: FeatureMatrix,
}

/// How a target row's aggregate fields were filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    Exact,
    Relaxed,
    ZeroFill,
}

pub struct FeatureBuilder<'a> {
    aggregates: &'a AggregateTable,
    relaxed: HashMap<(u32, u32), Vec<StatVector>>,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(aggregates: &'a AggregateTable) -> Self {
        Self {
            aggregates,
            relaxed: relaxed_index(aggregates),
        }
    }

    /// `sin_hour, cos_hour, sin_doy, cos_doy`, then `P_mean .. P_count` per parameter.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = TIME_FEATURES.iter().map(|c| c.to_string()).collect();
        for parameter in self.aggregates.parameters() {
            for suffix in STAT_SUFFIXES {
                columns.push(format!("{parameter}_{suffix}"));
            }
        }
        columns
    }

    /// Feature rows for every historical observation, with its own key's aggregates.
    pub fn training(&self, observations: &Observations) -> TrainingSet {
        let rows = observations
            .datetimes
            .iter()
            .map(|datetime| {
                let key = AggregateKey::from_datetime(datetime);
                let stats = self.exact(&key).unwrap_or_else(|| self.zeros());
                self.row(datetime, &stats)
            })
            .collect();
        let targets = observations
            .values
            .iter()
            .map(|values| values.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect();
        TrainingSet {
            datetimes: observations.datetimes.clone(),
            features: FeatureMatrix {
                columns: self.columns(),
                rows,
            },
            targets,
            parameters: self.aggregates.parameters().to_vec(),
        }
    }

    /// Feature rows for the 24 hours of `date`.
    pub fn targets(&self, date: NaiveDate) -> TargetSet {
        let datetimes = hours_of_day(date);
        let mut sources = [0usize; 3];
        let rows = datetimes
            .iter()
            .map(|datetime| {
                let (stats, source) = self.lookup(&AggregateKey::from_datetime(datetime));
                sources[source as usize] += 1;
                self.row(datetime, &stats)
            })
            .collect();
        debug!(
            "Target features for {}: {} exact, {} relaxed, {} zero-filled",
            date, sources[0], sources[1], sources[2]
        );
        TargetSet {
            datetimes,
            features: FeatureMatrix {
                columns: self.columns(),
                rows,
            },
        }
    }

    /// Aggregate fields for a forecast key: exact, then relaxed (month, hour), then zeros.
    pub fn lookup(&self, key: &AggregateKey) -> (Vec<StatVector>, LookupSource) {
        if let Some(stats) = self.exact(key) {
            (stats, LookupSource::Exact)
        } else if let Some(stats) = self.relaxed.get(&key.relaxed()) {
            (stats.clone(), LookupSource::Relaxed)
        } else {
            (self.zeros(), LookupSource::ZeroFill)
        }
    }

    fn exact(&self, key: &AggregateKey) -> Option<Vec<StatVector>> {
        self.aggregates
            .get(key)
            .map(|row| row.stats.iter().map(stat_vector).collect())
    }

    fn zeros(&self) -> Vec<StatVector> {
        vec![[0.0; STAT_SUFFIXES.len()]; self.aggregates.parameters().len()]
    }

    fn row(&self, datetime: &NaiveDateTime, stats: &[StatVector]) -> Vec<f64> {
        let mut row = Vec::with_capacity(TIME_FEATURES.len() + stats.len() * STAT_SUFFIXES.len());
        row.extend(time_features(datetime));
        for s in stats {
            row.extend_from_slice(s);
        }
        row
    }
}

/// `[sin_hour, cos_hour, sin_doy, cos_doy]` with periods 24 h and 365.25 days.
pub fn time_features(datetime: &NaiveDateTime) -> [f64; 4] {
    let hour_angle = TAU * f64::from(datetime.hour()) / HOURS_PER_DAY;
    let doy_angle = TAU * f64::from(datetime.ordinal()) / DAYS_PER_YEAR;
    [
        hour_angle.sin(),
        hour_angle.cos(),
        doy_angle.sin(),
        doy_angle.cos(),
    ]
}

fn stat_vector(stats: &ParameterStats) -> StatVector {
    [
        stats.mean.unwrap_or(0.0),
        stats.std.unwrap_or(0.0),
        stats.median.unwrap_or(0.0),
        stats.p5.unwrap_or(0.0),
        stats.p95.unwrap_or(0.0),
        f64::from(stats.count),
    ]
}

fn relaxed_index(aggregates: &AggregateTable) -> HashMap<(u32, u32), Vec<StatVector>> {
    let n_params = aggregates.parameters().len();
    let mut sums: HashMap<(u32, u32), Vec<[(f64, u32); STAT_SUFFIXES.len()]>> = HashMap::new();
    for (key, row) in aggregates.iter() {
        let entry = sums
            .entry(key.relaxed())
            .or_insert_with(|| vec![[(0.0, 0); STAT_SUFFIXES.len()]; n_params]);
        for (acc, stats) in entry.iter_mut().zip(&row.stats) {
            let fields = [
                stats.mean,
                stats.std,
                stats.median,
                stats.p5,
                stats.p95,
                Some(f64::from(stats.count)),
            ];
            for (slot, field) in acc.iter_mut().zip(fields) {
                if let Some(value) = field {
                    slot.0 += value;
                    slot.1 += 1;
                }
            }
        }
    }
    sums.into_iter()
        .map(|(key, per_param)| {
            let averaged = per_param
                .iter()
                .map(|acc| acc.map(|(sum, n)| if n > 0 { sum / f64::from(n) } else { 0.0 }))
                .collect();
            (key, averaged)
        })
        .collect()
}
