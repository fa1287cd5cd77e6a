use crate::config::parameter::ParameterProfile;
use crate::engine::PredictionTable;
use crate::model::stats::mean;
use serde::Serialize;
use std::collections::BTreeMap;

/// Whole-day figures per parameter: `P_mean` for every parameter and `P_total`
/// for accumulative ones such as precipitation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailySummary {
    pub entries: BTreeMap<String, f64>,
}

impl DailySummary {
    pub fn from_predictions(predictions: &PredictionTable, profiles: &[ParameterProfile]) -> Self {
        let mut entries = BTreeMap::new();
        for forecast in &predictions.parameters {
            let values: Vec<f64> = forecast
                .point
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .collect();
            let Some(daily_mean) = mean(&values) else {
                continue;
            };
            entries.insert(format!("{}_mean", forecast.parameter), daily_mean);
            let accumulative = profiles
                .iter()
                .any(|p| p.name == forecast.parameter && p.accumulative);
            if accumulative {
                entries.insert(
                    format!("{}_total", forecast.parameter),
                    values.iter().sum(),
                );
            }
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ParameterForecast;
    use crate::model::transform::Transform;
    use crate::types::calendar::hours_of_day;
    use chrono::NaiveDate;

    fn forecast(parameter: &str, value: f64) -> ParameterForecast {
        ParameterForecast {
            parameter: parameter.to_string(),
            point: vec![value; 24],
            quantiles: Vec::new(),
        }
    }

    #[test]
    fn test_mean_and_accumulative_total() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 2).unwrap();
        let predictions = PredictionTable {
            datetimes: hours_of_day(date),
            parameters: vec![forecast("T2M", 12.5), forecast("PRECTOTCORR", 0.25)],
        };
        let mut rain = ParameterProfile::plain("PRECTOTCORR");
        rain.transform = Transform::Log1p;
        rain.accumulative = true;
        let profiles = vec![ParameterProfile::plain("T2M"), rain];

        let summary = DailySummary::from_predictions(&predictions, &profiles);
        assert_eq!(summary.get("T2M_mean"), Some(12.5));
        assert_eq!(summary.get("T2M_total"), None);
        assert_eq!(summary.get("PRECTOTCORR_mean"), Some(0.25));
        assert_eq!(summary.get("PRECTOTCORR_total"), Some(6.0));
    }

    #[test]
    fn test_skeleton_has_empty_summary() {
        let predictions = PredictionTable::skeleton(Vec::new());
        assert!(DailySummary::from_predictions(&predictions, &[]).is_empty());
    }
}
