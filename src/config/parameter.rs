use crate::config::thresholds::ThresholdTable;
use crate::model::transform::Transform;
use crate::model::ModelFamily;
use serde::Serialize;

/// Everything the pipeline needs to know about one forecast parameter,
/// resolved from configuration at load time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterProfile {
    pub name: String,
    pub transform: Transform,
    pub model: ModelFamily,
    /// Accumulative quantities (precipitation) also get a daily total in the summary.
    pub accumulative: bool,
    pub thresholds: ThresholdTable,
}

impl ParameterProfile {
    /// Identity transform, default boosted model, no thresholds.
    pub fn plain(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transform: Transform::Identity,
            model: ModelFamily::default(),
            accumulative: false,
            thresholds: ThresholdTable::default(),
        }
    }
}
