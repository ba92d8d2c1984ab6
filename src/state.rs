use crate::{
    config::ModelConfig,
    model_service::{ImageModel, ModelError, TabularModel},
    ort_service::{OrtImageModel, OrtTabularModel},
};
use std::sync::Arc;

/// The three classifiers, loaded once at startup and shared read-only by
/// every request.
#[derive(Clone)]
pub struct Models {
    pub crop: Arc<dyn TabularModel>,
    pub fertilizer: Arc<dyn TabularModel>,
    pub disease: Arc<dyn ImageModel>,
}

impl Models {
    pub fn new(
        crop: impl TabularModel,
        fertilizer: impl TabularModel,
        disease: impl ImageModel,
    ) -> Self {
        Self {
            crop: Arc::new(crop),
            fertilizer: Arc::new(fertilizer),
            disease: Arc::new(disease),
        }
    }

    /// Builds ONNX Runtime sessions for all three artifacts. The first failure
    /// is returned and nothing is served.
    pub fn load(config: &ModelConfig) -> Result<Self, ModelError> {
        let crop = OrtTabularModel::new("crop", &config.crop_path(), config.num_instances)?;
        let fertilizer = OrtTabularModel::new(
            "fertilizer",
            &config.fertilizer_path(),
            config.num_instances,
        )?;
        let disease = OrtImageModel::new("disease", &config.disease_path(), config.num_instances)?;

        Ok(Self::new(crop, fertilizer, disease))
    }
}
