//! Per-parameter severity tables used to annotate the forecast series.

use crate::config::error::ConfigError;
use serde::{Deserialize, Serialize};

const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// One inclusive `[lower, upper]` severity class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRange {
    pub label: String,
    pub lower: f64,
    pub upper: f64,
    pub color: String,
}

impl ThresholdRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Ordered, validated list of severity classes for one parameter.
///
/// Ranges ascend, may share an endpoint with their neighbour but never overlap
/// beyond it, and leave no interior gap. A value on a shared endpoint belongs to
/// the lower class because lookup is first-match in table order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThresholdTable {
    ranges: Vec<ThresholdRange>,
}

impl ThresholdTable {
    /// Validates `ranges` for `parameter`.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::InvertedRange`] if a range has `lower > upper` (or a NaN bound).
    /// * [`ConfigError::OverlappingRanges`] if a range starts below the previous range's upper bound.
    /// * [`ConfigError::GappedRanges`] if a range starts above the previous range's upper bound.
    pub fn new(parameter: &str, ranges: Vec<ThresholdRange>) -> Result<Self, ConfigError> {
        for range in &ranges {
            if range.lower.is_nan() || range.upper.is_nan() || range.lower > range.upper {
                return Err(ConfigError::InvertedRange {
                    parameter: parameter.to_string(),
                    label: range.label.clone(),
                    lower: range.lower,
                    upper: range.upper,
                });
            }
        }
        for pair in ranges.windows(2) {
            let (previous, next) = (&pair[0], &pair[1]);
            if next.lower < previous.upper - BOUNDARY_TOLERANCE {
                return Err(ConfigError::OverlappingRanges {
                    parameter: parameter.to_string(),
                    previous: previous.label.clone(),
                    next: next.label.clone(),
                });
            }
            if next.lower > previous.upper + BOUNDARY_TOLERANCE {
                return Err(ConfigError::GappedRanges {
                    parameter: parameter.to_string(),
                    previous: previous.label.clone(),
                    next: next.label.clone(),
                    upper: previous.upper,
                    lower: next.lower,
                });
            }
        }
        Ok(Self { ranges })
    }

    pub fn ranges(&self) -> &[ThresholdRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Index of the first range containing `value`, or `None` when no range matches.
    pub fn classify(&self, value: f64) -> Option<usize> {
        self.ranges.iter().position(|r| r.contains(value))
    }
}
