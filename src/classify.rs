//! Severity bands and local extrema over an hourly point-estimate series.

use crate::config::thresholds::ThresholdTable;
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

/// Maximal run of consecutive hours in the same severity class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationBand {
    pub label: String,
    pub color: String,
    pub start: NaiveDateTime,
    /// Timestamp of the last hour in the run; one second after `start` for a single-hour run.
    pub end: NaiveDateTime,
    pub start_index: usize,
    pub end_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtremumKind {
    Maximum,
    Minimum,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtremaMarker {
    pub index: usize,
    pub datetime: NaiveDateTime,
    pub value: f64,
    pub kind: ExtremumKind,
}

/// Padding that keeps a single-hour band drawable.
pub const SINGLE_HOUR_PAD: Duration = Duration::seconds(1);

pub struct ThresholdClassifier<'a> {
    table: &'a ThresholdTable,
}

impl<'a> ThresholdClassifier<'a> {
    pub fn new(table: &'a ThresholdTable) -> Self {
        Self { table }
    }

    /// Per-value index of the first matching range, `None` when unclassified.
    pub fn classify(&self, values: &[f64]) -> Vec<Option<usize>> {
        values.iter().map(|&v| self.table.classify(v)).collect()
    }

    /// Run-length encodes the classes of `values` into bands. Unclassified hours
    /// break runs and produce no band.
    pub fn segment(&self, datetimes: &[NaiveDateTime], values: &[f64]) -> Vec<ClassificationBand> {
        let classes = self.classify(values);
        let n = classes.len().min(datetimes.len());
        let mut bands = Vec::new();
        let mut start = 0;
        while start < n {
            let class = classes[start];
            let mut end = start;
            while end + 1 < n && classes[end + 1] == class {
                end += 1;
            }
            if let Some(range) = class.and_then(|c| self.table.ranges().get(c)) {
                let end_time = if start == end {
                    datetimes[start] + SINGLE_HOUR_PAD
                } else {
                    datetimes[end]
                };
                bands.push(ClassificationBand {
                    label: range.label.clone(),
                    color: range.color.clone(),
                    start: datetimes[start],
                    end: end_time,
                    start_index: start,
                    end_index: end,
                });
            }
            start = end + 1;
        }
        bands
    }
}

/// Interior points strictly above (maximum) or below (minimum) both neighbours.
/// The first and last points are never flagged.
pub fn find_extrema(datetimes: &[NaiveDateTime], values: &[f64]) -> Vec<ExtremaMarker> {
    let n = values.len().min(datetimes.len());
    (1..n.saturating_sub(1))
        .filter_map(|i| {
            let (prev, value, next) = (values[i - 1], values[i], values[i + 1]);
            let kind = if value > prev && value > next {
                ExtremumKind::Maximum
            } else if value < prev && value < next {
                ExtremumKind::Minimum
            } else {
                return None;
            };
            Some(ExtremaMarker {
                index: i,
                datetime: datetimes[i],
                value,
                kind,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::error::ConfigError;
    use crate::config::thresholds::ThresholdRange;
    use chrono::NaiveDate;

    fn hours(n: i64) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2025, 10, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|h| start + Duration::hours(h)).collect()
    }

    fn range(label: &str, lower: f64, upper: f64) -> ThresholdRange {
        ThresholdRange {
            label: label.to_string(),
            lower,
            upper,
            color: format!("color-{label}"),
        }
    }

    #[test]
    fn test_single_peak_is_the_only_extremum() -> Result<(), ConfigError> {
        let table = ThresholdTable::new("T2M", vec![range("All", 0.0, 10000.0)])?;
        let values = [1.0, 2.0, 3.0, 2.0, 1.0];
        let datetimes = hours(5);

        let extrema = find_extrema(&datetimes, &values);
        assert_eq!(extrema.len(), 1);
        assert_eq!(extrema[0].index, 2);
        assert_eq!(extrema[0].kind, ExtremumKind::Maximum);
        assert_eq!(extrema[0].value, 3.0);

        let bands = ThresholdClassifier::new(&table).segment(&datetimes, &values);
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].start_index, 0);
        assert_eq!(bands[0].end_index, 4);
        assert_eq!(bands[0].end, datetimes[4]);
        Ok(())
    }

    #[test]
    fn test_runs_split_on_class_change() -> Result<(), ConfigError> {
        let table = ThresholdTable::new(
            "T2M",
            vec![range("Cold", 0.0, 15.0), range("Cool", 15.0, 25.0)],
        )?;
        let values = [10.0, 12.0, 16.0, 15.0, 30.0, 20.0, 21.0];
        let datetimes = hours(7);
        let bands = ThresholdClassifier::new(&table).segment(&datetimes, &values);

        let summary: Vec<(&str, usize, usize)> = bands
            .iter()
            .map(|b| (b.label.as_str(), b.start_index, b.end_index))
            .collect();
        assert_eq!(
            summary,
            vec![("Cold", 0, 1), ("Cool", 2, 2), ("Cold", 3, 3), ("Cool", 5, 6)]
        );
        assert_eq!(bands[1].end - bands[1].start, SINGLE_HOUR_PAD);
        assert_eq!(bands[0].color, "color-Cold");
        Ok(())
    }

    #[test]
    fn test_flat_and_boundary_points_are_not_extrema() {
        let datetimes = hours(6);
        assert!(find_extrema(&datetimes, &[5.0, 1.0, 1.0, 2.0, 2.0, 9.0]).is_empty());
        let valley = find_extrema(&datetimes[..3], &[3.0, 1.0, 3.0]);
        assert_eq!(valley.len(), 1);
        assert_eq!(valley[0].kind, ExtremumKind::Minimum);
        assert!(find_extrema(&datetimes[..2], &[1.0, 2.0]).is_empty());
        assert!(find_extrema(&[], &[]).is_empty());
    }
}
