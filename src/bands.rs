//! Named confidence bands for the rendering layer.
//!
//! Every parameter `P` yields a point column `P` and, per confidence level α,
//! `P_low_<L>` / `P_high_<L>` with `L = round(100α)`. A trailing row closes the
//! last hour so the series can be drawn up to 24:00.

use crate::config::confidence::{level_label, CiMapping};
use crate::config::ForecastConfig;
use crate::engine::{ParameterForecast, PredictionTable};
use crate::history::table::DATETIME;
use chrono::{Duration, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;

const PERCENTILE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BandRole {
    Point,
    /// Lower bound of the interval labelled by the integer level.
    Low(u32),
    High(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandColumn {
    pub name: String,
    pub parameter: String,
    pub role: BandRole,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandTable {
    pub datetimes: Vec<NaiveDateTime>,
    pub columns: Vec<BandColumn>,
}

impl BandTable {
    pub fn len(&self) -> usize {
        self.datetimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datetimes.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&BandColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.columns.len() + 1);
        columns.push(Series::new(DATETIME.into(), self.datetimes.as_slice()).into());
        for column in &self.columns {
            let series = Series::new(column.name.as_str().into(), column.values.as_slice());
            columns.push(series.into());
        }
        DataFrame::new(columns)
    }
}

/// Maps prediction tables onto named confidence bands.
#[derive(Debug, Clone)]
pub struct BandAssembler {
    confidence: CiMapping,
    levels: Vec<f64>,
}

impl BandAssembler {
    /// `levels` are emitted in ascending order whatever order they are given in.
    pub fn new(confidence: CiMapping, levels: &[f64]) -> Self {
        let mut levels = levels.to_vec();
        levels.sort_by(|a, b| a.total_cmp(b));
        levels.dedup();
        Self { confidence, levels }
    }

    pub fn from_config(config: &ForecastConfig) -> Self {
        Self::new(config.confidence().clone(), config.ci_levels())
    }

    pub fn assemble(&self, predictions: &PredictionTable) -> BandTable {
        let width = predictions.parameters.len() * (1 + 2 * self.levels.len());
        let mut columns = Vec::with_capacity(width);
        for forecast in &predictions.parameters {
            columns.push(BandColumn {
                name: forecast.parameter.clone(),
                parameter: forecast.parameter.clone(),
                role: BandRole::Point,
                values: forecast.point.clone(),
            });
            for &level in &self.levels {
                let label = level_label(level);
                let pair = self.confidence.percentiles(level);
                columns.push(BandColumn {
                    name: format!("{}_low_{}", forecast.parameter, label),
                    parameter: forecast.parameter.clone(),
                    role: BandRole::Low(label),
                    values: percentile_values(forecast, pair.low),
                });
                columns.push(BandColumn {
                    name: format!("{}_high_{}", forecast.parameter, label),
                    parameter: forecast.parameter.clone(),
                    role: BandRole::High(label),
                    values: percentile_values(forecast, pair.high),
                });
            }
        }

        let mut datetimes = predictions.datetimes.clone();
        if let Some(&last) = datetimes.last() {
            datetimes.push(last + Duration::hours(1));
            for column in &mut columns {
                if let Some(&value) = column.values.last() {
                    column.values.push(value);
                }
            }
        }
        BandTable { datetimes, columns }
    }
}

/// Values at `percentile`, interpolated between the nearest predicted percentiles and
/// clamped to the outermost ones.
fn percentile_values(forecast: &ParameterForecast, percentile: f64) -> Vec<f64> {
    let series = &forecast.quantiles;
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return forecast.point.clone();
    };
    if let Some(exact) = forecast.series(percentile) {
        return exact.values.clone();
    }
    if percentile <= first.percentile + PERCENTILE_TOLERANCE {
        return first.values.clone();
    }
    if percentile >= last.percentile - PERCENTILE_TOLERANCE {
        return last.values.clone();
    }
    let upper = series.partition_point(|s| s.percentile < percentile);
    let (below, above) = (&series[upper - 1], &series[upper]);
    let weight = (percentile - below.percentile) / (above.percentile - below.percentile);
    below
        .values
        .iter()
        .zip(&above.values)
        .map(|(lo, hi)| lo + (hi - lo) * weight)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::QuantileSeries;
    use chrono::NaiveDate;

    fn hours() -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2025, 10, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..24).map(|h| start + Duration::hours(h)).collect()
    }

    /// Quantile values `percentile / 10 + hour`, monotone in both directions.
    fn predictions(percentiles: &[f64]) -> PredictionTable {
        let quantiles: Vec<QuantileSeries> = percentiles
            .iter()
            .map(|&p| QuantileSeries {
                percentile: p,
                values: (0..24).map(|h| p / 10.0 + h as f64).collect(),
            })
            .collect();
        PredictionTable {
            datetimes: hours(),
            parameters: vec![ParameterForecast {
                parameter: "T2M".to_string(),
                point: (0..24).map(|h| 5.0 + h as f64).collect(),
                quantiles,
            }],
        }
    }

    #[test]
    fn test_band_columns_and_boundary_row() {
        let assembler = BandAssembler::new(CiMapping::standard(), &[0.9, 0.3, 0.6]);
        let table = assembler.assemble(&predictions(&[5.0, 20.0, 35.0, 50.0, 65.0, 80.0, 95.0]));

        assert_eq!(
            table.column_names(),
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
        assert_eq!(table.len(), 25);
        assert_eq!(table.datetimes[24] - table.datetimes[23], Duration::hours(1));
        for column in &table.columns {
            assert_eq!(column.values.len(), 25);
            assert_eq!(column.values[24], column.values[23]);
        }
        assert_eq!(table.column("T2M_low_90").unwrap().values[0], 0.5);
        assert_eq!(table.column("T2M_high_30").unwrap().values[3], 6.5 + 3.0);
    }

    #[test]
    fn test_bands_are_ordered_for_monotone_quantiles() {
        let assembler = BandAssembler::new(CiMapping::standard(), &[0.3, 0.6, 0.9]);
        let table = assembler.assemble(&predictions(&[5.0, 20.0, 35.0, 50.0, 65.0, 80.0, 95.0]));
        for label in [30, 60, 90] {
            let low = &table.column(&format!("T2M_low_{label}")).unwrap().values;
            let high = &table.column(&format!("T2M_high_{label}")).unwrap().values;
            let point = &table.column("T2M").unwrap().values;
            for h in 0..25 {
                assert!(low[h] <= point[h] && point[h] <= high[h]);
            }
        }
    }

    #[test]
    fn test_unmapped_level_interpolates() {
        let assembler = BandAssembler::new(CiMapping::standard(), &[0.5]);
        let table = assembler.assemble(&predictions(&[5.0, 20.0, 35.0, 50.0, 65.0, 80.0, 95.0]));
        // (25, 75) sits between predicted percentiles.
        assert!((table.column("T2M_low_50").unwrap().values[0] - 2.5).abs() < 1e-12);
        assert!((table.column("T2M_high_50").unwrap().values[0] - 7.5).abs() < 1e-12);
    }

    #[test]
    fn test_percentiles_outside_predictions_are_clamped() {
        let assembler = BandAssembler::new(CiMapping::standard(), &[0.9]);
        let table = assembler.assemble(&predictions(&[20.0, 50.0, 80.0]));
        assert_eq!(table.column("T2M_low_90").unwrap().values[0], 2.0);
        assert_eq!(table.column("T2M_high_90").unwrap().values[0], 8.0);
    }

    #[test]
    fn test_skeleton_keeps_datetimes_only() -> Result<(), PolarsError> {
        let assembler = BandAssembler::new(CiMapping::standard(), &[0.3]);
        let table = assembler.assemble(&PredictionTable::skeleton(hours()));
        assert_eq!(table.len(), 25);
        assert!(table.columns.is_empty());
        assert_eq!(table.to_dataframe()?.shape(), (25, 1));
        Ok(())
    }
}
