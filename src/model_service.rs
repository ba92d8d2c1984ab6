use ndarray::{Array, Ix4};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("failed to load {model} model from {path:?}: {reason}")]
    Load {
        model: &'static str,
        path: PathBuf,
        reason: String,
    },
    #[error("session mutex poisoned: {0}")]
    Poisoned(String),
    #[error("failed to build tensor: {0}")]
    Tensor(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("failed to extract output `{output}`: {reason}")]
    Output { output: String, reason: String },
    #[error("model produced no outputs")]
    NoOutputs,
    #[error("model produced an empty score vector")]
    EmptyScores,
}

/// Raw label emitted by a tabular classifier.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassLabel {
    Index(i64),
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabularPrediction {
    pub label: ClassLabel,
    pub probabilities: Vec<f32>,
}

impl TabularPrediction {
    /// Highest class probability as a percentage.
    pub fn confidence(&self) -> f64 {
        top_class(&self.probabilities)
            .map(|(_, score)| score as f64 * 100.0)
            .unwrap_or(0.0)
    }
}

pub trait TabularModel: Send + Sync + 'static {
    fn predict(&self, features: &[f32]) -> Result<TabularPrediction, ModelError>;
}

/// Takes an NHWC batch of one image and returns the class scores.
pub trait ImageModel: Send + Sync + 'static {
    fn predict(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, ModelError>;
}

/// Arg-max over the scores, returning the winning index and its score.
pub fn top_class(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .enumerate()
        .map(|(index, value)| (index, *value))
        .reduce(|accum, item| if item.1 > accum.1 { item } else { accum })
}
