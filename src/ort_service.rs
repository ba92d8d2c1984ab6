use crate::model_service::{ClassLabel, ImageModel, ModelError, TabularModel, TabularPrediction};
use ndarray::{Array, Array2, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session, SessionOutputs},
    value::{DynValue, TensorRef},
};
use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

/// Round-robin pool of ONNX Runtime sessions over a single artifact.
pub struct SessionPool {
    name: &'static str,
    sessions: Vec<Mutex<Session>>,
    output_names: Vec<String>,
    counter: AtomicUsize,
}

impl SessionPool {
    pub fn new(name: &'static str, path: &Path, num_instances: usize) -> Result<Self, ModelError> {
        let load_error = |reason: String| ModelError::Load {
            model: name,
            path: path.to_path_buf(),
            reason,
        };

        let sessions = (0..num_instances.max(1))
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(path)?;
                Ok(session)
            })
            .collect::<Result<Vec<_>, ort::Error>>()
            .map_err(|e| load_error(e.to_string()))?;

        let output_names: Vec<String> = sessions[0]
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();
        if output_names.is_empty() {
            return Err(load_error("graph declares no outputs".to_string()));
        }

        tracing::info!(
            "Created {} ONNX sessions for {} model from {:?}",
            sessions.len(),
            name,
            path
        );

        Ok(Self {
            name,
            sessions: sessions.into_iter().map(Mutex::new).collect(),
            output_names,
            counter: AtomicUsize::new(0),
        })
    }

    /// Runs one inference on the next session in line and hands the outputs to
    /// `extract` while the session is still locked.
    fn run<D, T, F>(&self, input: &Array<f32, D>, extract: F) -> Result<T, ModelError>
    where
        D: ndarray::Dimension + 'static,
        F: FnOnce(&SessionOutputs, &[String]) -> Result<T, ModelError>,
    {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ModelError::Poisoned(e.to_string()))?;

        tracing::debug!("Running {} model on session {}", self.name, index);
        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.as_standard_layout().to_owned();
            owned_buffer.view()
        };

        let tensor_ref =
            TensorRef::from_array_view(input_view).map_err(|e| ModelError::Tensor(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        extract(&outputs, &self.output_names)
    }
}

fn extract_scores(value: &DynValue, output: &str) -> Result<Vec<f32>, ModelError> {
    let (_shape, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|e| ModelError::Output {
            output: output.to_string(),
            reason: e.to_string(),
        })?;
    Ok(data.to_vec())
}

fn extract_label(value: &DynValue, output: &str) -> Result<ClassLabel, ModelError> {
    if let Ok((_shape, data)) = value.try_extract_tensor::<i64>() {
        return data
            .first()
            .map(|index| ClassLabel::Index(*index))
            .ok_or(ModelError::Output {
                output: output.to_string(),
                reason: "label tensor is empty".to_string(),
            });
    }

    let (_shape, labels) = value.try_extract_strings().map_err(|e| ModelError::Output {
        output: output.to_string(),
        reason: format!("expected an int64 or string label tensor: {}", e),
    })?;
    labels
        .into_iter()
        .next()
        .map(ClassLabel::Name)
        .ok_or(ModelError::Output {
            output: output.to_string(),
            reason: "label tensor is empty".to_string(),
        })
}

/// Classifier exported from a scikit-learn style pipeline: output 0 is the
/// label, output 1 the dense class probabilities.
pub struct OrtTabularModel {
    pool: SessionPool,
}

impl OrtTabularModel {
    pub fn new(name: &'static str, path: &Path, num_instances: usize) -> Result<Self, ModelError> {
        let pool = SessionPool::new(name, path, num_instances)?;
        if pool.output_names.len() < 2 {
            return Err(ModelError::Load {
                model: name,
                path: path.to_path_buf(),
                reason: "expected label and probabilities outputs".to_string(),
            });
        }
        Ok(Self { pool })
    }
}

impl TabularModel for OrtTabularModel {
    fn predict(&self, features: &[f32]) -> Result<TabularPrediction, ModelError> {
        let input = Array2::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| ModelError::Tensor(e.to_string()))?;

        self.pool.run(&input, |outputs, names| {
            let label_name = names[0].as_str();
            let scores_name = names[1].as_str();
            let label = extract_label(&outputs[label_name], label_name)?;
            let probabilities = extract_scores(&outputs[scores_name], scores_name)?;
            Ok(TabularPrediction {
                label,
                probabilities,
            })
        })
    }
}

/// Convolutional classifier with a single softmax output.
pub struct OrtImageModel {
    pool: SessionPool,
}

impl OrtImageModel {
    pub fn new(name: &'static str, path: &Path, num_instances: usize) -> Result<Self, ModelError> {
        Ok(Self {
            pool: SessionPool::new(name, path, num_instances)?,
        })
    }
}

impl ImageModel for OrtImageModel {
    fn predict(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, ModelError> {
        self.pool.run(input, |outputs, names| {
            let name = names.first().ok_or(ModelError::NoOutputs)?.as_str();
            let scores = extract_scores(&outputs[name], name)?;
            if scores.is_empty() {
                return Err(ModelError::EmptyScores);
            }
            Ok(scores)
        })
    }
}
