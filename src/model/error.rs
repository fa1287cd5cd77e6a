use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Parameter '{0}' has no finite target values to train on")]
    NoFiniteTargets(String),

    #[error("Training set has no rows with a finite target")]
    EmptyTrainingSet,

    #[error("Feature columns differ between training ({training} columns) and prediction ({prediction} columns)")]
    FeatureColumnsDiffer { training: usize, prediction: usize },

    #[error("Parameter '{0}' is not present in the training targets")]
    MissingTarget(String),

    #[error("No median can be derived from quantiles {0:?}")]
    UnresolvableMedian(Vec<f64>),

    #[error("Parameter '{0}' is not configured")]
    UnknownParameter(String),
}
