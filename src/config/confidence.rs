//! Mapping from confidence level α to the percentile pair that bounds it.

use crate::config::error::ConfigError;
use serde::{Deserialize, Serialize};

const LEVEL_TOLERANCE: f64 = 1e-9;

/// `(low, high)` percentiles on the `0..=100` scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentilePair {
    pub low: f64,
    pub high: f64,
}

impl PercentilePair {
    /// The central interval `(50 − 50α, 50 + 50α)`.
    pub fn central(level: f64) -> Self {
        Self {
            low: 50.0 - 50.0 * level,
            high: 50.0 + 50.0 * level,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CiEntry {
    pub level: f64,
    pub low: f64,
    pub high: f64,
}

/// Validated CI-level → percentile-pair table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CiMapping {
    entries: Vec<CiEntry>,
}

impl CiMapping {
    /// # Errors
    ///
    /// [`ConfigError::LevelOutOfRange`] for a level outside `(0, 1)`, and
    /// [`ConfigError::AsymmetricMapping`] unless `low < 50 < high` and `low + high == 100`.
    pub fn new(entries: Vec<CiEntry>) -> Result<Self, ConfigError> {
        for entry in &entries {
            validate_level(entry.level)?;
            let symmetric = (entry.low + entry.high - 100.0).abs() < LEVEL_TOLERANCE;
            if !(entry.low < 50.0 && entry.high > 50.0 && symmetric) {
                return Err(ConfigError::AsymmetricMapping {
                    level: entry.level,
                    low: entry.low,
                    high: entry.high,
                });
            }
        }
        Ok(Self { entries })
    }

    /// {0.9 → (5, 95), 0.6 → (20, 80), 0.3 → (35, 65)}.
    pub fn standard() -> Self {
        Self {
            entries: vec![
                CiEntry { level: 0.9, low: 5.0, high: 95.0 },
                CiEntry { level: 0.6, low: 20.0, high: 80.0 },
                CiEntry { level: 0.3, low: 35.0, high: 65.0 },
            ],
        }
    }

    /// Percentile pair for `level`, falling back to [`PercentilePair::central`] for unmapped levels.
    pub fn percentiles(&self, level: f64) -> PercentilePair {
        self.entries
            .iter()
            .find(|e| (e.level - level).abs() < LEVEL_TOLERANCE)
            .map(|e| PercentilePair {
                low: e.low,
                high: e.high,
            })
            .unwrap_or_else(|| PercentilePair::central(level))
    }
}

pub(crate) fn validate_level(level: f64) -> Result<(), ConfigError> {
    if level > 0.0 && level < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::LevelOutOfRange(level))
    }
}

/// Integer label used in band column names, e.g. `0.9` → `90`.
pub fn level_label(level: f64) -> u32 {
    (level * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_lookup_and_fallback() {
        let mapping = CiMapping::standard();
        assert_eq!(mapping.percentiles(0.9), PercentilePair { low: 5.0, high: 95.0 });
        assert_eq!(mapping.percentiles(0.3), PercentilePair { low: 35.0, high: 65.0 });
        let fallback = mapping.percentiles(0.5);
        assert!((fallback.low - 25.0).abs() < 1e-12);
        assert!((fallback.high - 75.0).abs() < 1e-12);
    }

    #[test]
    fn test_asymmetric_entry_is_rejected() {
        let err = CiMapping::new(vec![CiEntry { level: 0.8, low: 5.0, high: 90.0 }]);
        assert!(matches!(err, Err(ConfigError::AsymmetricMapping { .. })));
    }

    #[test]
    fn test_level_labels() {
        assert_eq!(level_label(0.3), 30);
        assert_eq!(level_label(0.6), 60);
        assert_eq!(level_label(0.9), 90);
    }
}
