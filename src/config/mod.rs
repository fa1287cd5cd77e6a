//! Immutable forecast configuration.
//!
//! A [`ForecastConfig`] is parsed from TOML once at start-up, validated, and then
//! only ever shared by reference (or `Arc`). It carries the CI-level mapping, the
//! quantile list, engine selection and one [`ParameterProfile`] per parameter.

pub mod confidence;
pub mod error;
pub mod parameter;
pub mod thresholds;

use crate::config::confidence::{validate_level, CiEntry, CiMapping};
use crate::config::error::ConfigError;
use crate::config::parameter::ParameterProfile;
use crate::config::thresholds::{ThresholdRange, ThresholdTable};
use crate::engine::quantile::resolve_median;
use crate::engine::EngineKind;
use crate::model::booster::BoosterParams;
use crate::model::transform::Transform;
use crate::model::ModelFamily;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const BUILTIN_CONFIG: &str = include_str!("../../config/default.toml");

/// Settings of the bootstrap ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapSettings {
    /// Number of resampled members (K).
    pub members: usize,
    /// Member `i` is seeded with `seed + i`.
    pub seed: u64,
    /// Hyper-parameters of every boosted member, in place of each parameter's own
    /// `Boosted` settings. Climatology parameters keep zero trees.
    pub model: BoosterParams,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            members: 20,
            seed: 0,
            model: BoosterParams {
                n_estimators: 200,
                learning_rate: 0.05,
                ..BoosterParams::default()
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    engine: EngineKind,
    #[serde(default = "default_quantiles")]
    quantiles: Vec<f64>,
    #[serde(default = "default_ci_levels")]
    ci_levels: Vec<f64>,
    #[serde(default = "default_rearrange")]
    rearrange_quantiles: bool,
    #[serde(default)]
    bootstrap: BootstrapSettings,
    #[serde(default)]
    confidence: Vec<CiEntry>,
    #[serde(default, rename = "parameter")]
    parameters: Vec<RawParameter>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParameter {
    name: String,
    #[serde(default)]
    transform: Transform,
    #[serde(default)]
    model: ModelFamily,
    #[serde(default)]
    accumulative: bool,
    #[serde(default)]
    thresholds: Vec<ThresholdRange>,
}

fn default_quantiles() -> Vec<f64> {
    vec![0.05, 0.2, 0.35, 0.5, 0.65, 0.8, 0.95]
}

fn default_ci_levels() -> Vec<f64> {
    vec![0.3, 0.6, 0.9]
}

fn default_rearrange() -> bool {
    true
}

/// Validated, read-only forecast configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastConfig {
    engine: EngineKind,
    quantiles: Vec<f64>,
    ci_levels: Vec<f64>,
    rearrange_quantiles: bool,
    bootstrap: BootstrapSettings,
    confidence: CiMapping,
    parameters: Vec<ParameterProfile>,
}

impl ForecastConfig {
    /// The configuration bundled with the crate (`config/default.toml`).
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN_CONFIG)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config = Self::from_toml_str(&contents)?;
        info!(
            "Loaded forecast configuration from {} ({} parameters, engine {})",
            path.display(),
            config.parameters.len(),
            config.engine
        );
        Ok(config)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and the validation variants of
    /// [`ConfigError`] for inconsistent quantiles, levels, CI mapping, thresholds or models.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(contents)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        validate_quantiles(&raw.quantiles)?;
        for &level in &raw.ci_levels {
            validate_level(level)?;
        }
        if raw.bootstrap.members == 0 {
            return Err(ConfigError::NoBootstrapMembers);
        }
        validate_booster("bootstrap", &raw.bootstrap.model)?;

        let confidence = if raw.confidence.is_empty() {
            CiMapping::standard()
        } else {
            CiMapping::new(raw.confidence)?
        };

        if raw.parameters.is_empty() {
            return Err(ConfigError::NoParameters);
        }
        let mut seen = HashSet::new();
        let mut parameters = Vec::with_capacity(raw.parameters.len());
        for p in raw.parameters {
            if !seen.insert(p.name.clone()) {
                return Err(ConfigError::DuplicateParameter(p.name));
            }
            if let ModelFamily::Boosted(params) = &p.model {
                validate_booster(&p.name, params)?;
            }
            let thresholds = ThresholdTable::new(&p.name, p.thresholds)?;
            parameters.push(ParameterProfile {
                name: p.name,
                transform: p.transform,
                model: p.model,
                accumulative: p.accumulative,
                thresholds,
            });
        }

        let mut ci_levels = raw.ci_levels;
        ci_levels.sort_by(|a, b| a.total_cmp(b));
        ci_levels.dedup();

        Ok(Self {
            engine: raw.engine,
            quantiles: raw.quantiles,
            ci_levels,
            rearrange_quantiles: raw.rearrange_quantiles,
            bootstrap: raw.bootstrap,
            confidence,
            parameters,
        })
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    /// Ascending quantile levels τ of the quantile ensemble.
    pub fn quantiles(&self) -> &[f64] {
        &self.quantiles
    }

    /// Ascending confidence levels α.
    pub fn ci_levels(&self) -> &[f64] {
        &self.ci_levels
    }

    pub fn rearrange_quantiles(&self) -> bool {
        self.rearrange_quantiles
    }

    pub fn bootstrap(&self) -> &BootstrapSettings {
        &self.bootstrap
    }

    pub fn confidence(&self) -> &CiMapping {
        &self.confidence
    }

    pub fn parameters(&self) -> &[ParameterProfile] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterProfile> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}

fn validate_quantiles(quantiles: &[f64]) -> Result<(), ConfigError> {
    for &q in quantiles {
        if !(q > 0.0 && q < 1.0) {
            return Err(ConfigError::QuantileOutOfRange(q));
        }
    }
    for pair in quantiles.windows(2) {
        if pair[1] <= pair[0] {
            return Err(ConfigError::QuantilesNotAscending {
                previous: pair[0],
                next: pair[1],
            });
        }
    }
    if resolve_median(quantiles).is_none() {
        return Err(ConfigError::NoMedianQuantile(quantiles.to_vec()));
    }
    Ok(())
}

fn validate_booster(parameter: &str, params: &BoosterParams) -> Result<(), ConfigError> {
    let reason = if !(params.learning_rate > 0.0 && params.learning_rate.is_finite()) {
        Some(format!("learning_rate must be positive, got {}", params.learning_rate))
    } else if params.max_depth == 0 && params.n_estimators > 0 {
        Some("max_depth must be at least 1".to_string())
    } else if params.max_bins < 2 {
        Some(format!("max_bins must be at least 2, got {}", params.max_bins))
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ConfigError::InvalidModel {
            parameter: parameter.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_config_loads() -> Result<(), ConfigError> {
        let config = ForecastConfig::builtin()?;
        assert_eq!(config.engine(), EngineKind::Quantile);
        assert_eq!(config.quantiles().len(), 7);
        assert_eq!(config.ci_levels(), &[0.3, 0.6, 0.9]);
        assert_eq!(
            config.parameter_names(),
            ["T2M", "RH2M", "PRECTOTCORR", "ALLSKY_SFC_SW_DWN", "WS2M"]
        );
        let precipitation = config.parameter("PRECTOTCORR").unwrap();
        assert_eq!(precipitation.transform, Transform::Log1p);
        assert!(precipitation.accumulative);
        assert_eq!(precipitation.thresholds.ranges().len(), 3);
        assert_eq!(config.bootstrap().members, 20);
        Ok(())
    }

    #[test]
    fn test_minimal_config_uses_defaults() -> Result<(), ConfigError> {
        let config = ForecastConfig::from_toml_str(
            r#"
            [[parameter]]
            name = "T2M"
            "#,
        )?;
        assert_eq!(config.quantiles(), default_quantiles().as_slice());
        assert_eq!(config.confidence(), &CiMapping::standard());
        assert_eq!(config.parameter("T2M").unwrap().model, ModelFamily::default());
        Ok(())
    }

    #[test]
    fn test_climatology_family_parses() -> Result<(), ConfigError> {
        let config = ForecastConfig::from_toml_str(
            r#"
            engine = "bootstrap"
            [[parameter]]
            name = "WS2M"
            model = { family = "climatology" }
            "#,
        )?;
        assert_eq!(config.engine(), EngineKind::Bootstrap);
        assert_eq!(config.parameter("WS2M").unwrap().model, ModelFamily::Climatology);
        Ok(())
    }

    #[test]
    fn test_quantiles_without_median_are_rejected() {
        let err = ForecastConfig::from_toml_str(
            r#"
            quantiles = [0.1, 0.3, 0.8]
            [[parameter]]
            name = "T2M"
            "#,
        );
        assert!(matches!(err, Err(ConfigError::NoMedianQuantile(_))));
    }

    #[test]
    fn test_symmetric_pair_resolves_median() -> Result<(), ConfigError> {
        ForecastConfig::from_toml_str(
            r#"
            quantiles = [0.1, 0.25, 0.75, 0.9]
            [[parameter]]
            name = "T2M"
            "#,
        )?;
        Ok(())
    }

    #[test]
    fn test_descending_quantiles_are_rejected() {
        let err = ForecastConfig::from_toml_str(
            r#"
            quantiles = [0.5, 0.2]
            [[parameter]]
            name = "T2M"
            "#,
        );
        assert!(matches!(err, Err(ConfigError::QuantilesNotAscending { .. })));
    }

    #[test]
    fn test_duplicate_parameter_is_rejected() {
        let err = ForecastConfig::from_toml_str(
            r#"
            [[parameter]]
            name = "T2M"
            [[parameter]]
            name = "T2M"
            "#,
        );
        assert!(matches!(err, Err(ConfigError::DuplicateParameter(_))));
    }

    #[test]
    fn test_gapped_thresholds_fail_at_load() {
        let err = ForecastConfig::from_toml_str(
            r#"
            [[parameter]]
            name = "WS2M"
            thresholds = [
                { label = "Light breeze", lower = 0.0, upper = 5.4, color = "a" },
                { label = "Moderate breeze", lower = 5.5, upper = 10.7, color = "b" },
            ]
            "#,
        );
        assert!(matches!(err, Err(ConfigError::GappedRanges { .. })));
    }

    #[test]
    fn test_zero_bootstrap_members_is_rejected() {
        let toml = r#"
            [bootstrap]
            members = 0

            [[parameter]]
            name = "T2M"
        "#;
        let err = ForecastConfig::from_toml_str(toml);
        assert!(matches!(err, Err(ConfigError::NoBootstrapMembers)));
    }

    #[test]
    fn test_invalid_model_is_rejected() {
        let toml = r#"
            [[parameter]]
            name = "T2M"
            model = { family = "boosted", n_estimators = 10, learning_rate = 0.0 }
        "#;
        let err = ForecastConfig::from_toml_str(toml);
        assert!(matches!(
            err,
            Err(ConfigError::InvalidModel { parameter, .. }) if parameter == "T2M"
        ));

        let toml = r#"
            [bootstrap]
            model = { max_depth = 0 }

            [[parameter]]
            name = "T2M"
        "#;
        let err = ForecastConfig::from_toml_str(toml);
        assert!(matches!(
            err,
            Err(ConfigError::InvalidModel { parameter, .. }) if parameter == "bootstrap"
        ));
    }

    #[test]
    fn test_no_parameters_is_rejected() {
        let err = ForecastConfig::from_toml_str("engine = \"quantile\"");
        assert!(matches!(err, Err(ConfigError::NoParameters)));
    }
}
