use super::{record_outcome, run_blocking, PredictionError};
use crate::{
    catalog::diagnose,
    model_service::{top_class, ModelError},
    preprocess::{transform_image, validate_content_type, validate_size},
    server::SharedState,
};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::instrument;

const ROUTE: &str = "disease";

/// Multipart field carrying the leaf image.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize, Deserialize)]
pub struct DiseasePrediction {
    pub disease: String,
    pub confidence: f64,
    pub remedies: Vec<String>,
}

#[instrument(skip(state, multipart))]
pub async fn predict_disease(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DiseasePrediction>, PredictionError> {
    let started = Instant::now();
    let result = diagnose_upload(&state, multipart).await;
    record_outcome(&state.metrics, ROUTE, started, &result);
    result.map(Json)
}

async fn diagnose_upload(
    state: &SharedState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<DiseasePrediction, PredictionError> {
    let mut multipart = multipart.map_err(|e| PredictionError::BadRequest(e.body_text()))?;
    let image_data = read_upload(&mut multipart, state.disease.max_upload_bytes).await?;

    let input_size = state.disease.input_size;
    let model = state.models.disease.clone();
    let scores = run_blocking(move || {
        let input = transform_image(&image_data, input_size)?;
        Ok(model.predict(&input)?)
    })
    .await?;

    let (index, score) = top_class(&scores).ok_or(ModelError::EmptyScores)?;
    let diagnosis = diagnose(index);
    tracing::debug!("Predicted class {} ({}) with score {:.3}", index, diagnosis.class_name, score);

    Ok(DiseasePrediction {
        disease: diagnosis.display_name(),
        confidence: score as f64 * 100.0,
        remedies: diagnosis.remedies,
    })
}

async fn read_upload(multipart: &mut Multipart, limit: usize) -> Result<Bytes, PredictionError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PredictionError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        validate_content_type(field.content_type())?;
        let image_data = field
            .bytes()
            .await
            .map_err(|e| PredictionError::BadRequest(e.body_text()))?;
        validate_size(image_data.len(), limit)?;

        return Ok(image_data);
    }

    Err(PredictionError::BadRequest(format!(
        "missing `{}` field in multipart upload",
        UPLOAD_FIELD
    )))
}
