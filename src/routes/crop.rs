use super::{record_outcome, run_blocking, PredictionError};
use crate::{
    catalog::{crop_name, CROP_IMAGE_URL},
    features::CropRequest,
    server::SharedState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::instrument;

const ROUTE: &str = "crop";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropPrediction {
    pub crop: String,
    pub confidence: f64,
    pub image_url: String,
}

#[instrument(skip(state, payload))]
pub async fn predict_crop(
    State(state): State<SharedState>,
    payload: Result<Json<CropRequest>, JsonRejection>,
) -> Result<Json<CropPrediction>, PredictionError> {
    let started = Instant::now();
    let result = recommend_crop(&state, payload).await;
    record_outcome(&state.metrics, ROUTE, started, &result);
    result.map(Json)
}

async fn recommend_crop(
    state: &SharedState,
    payload: Result<Json<CropRequest>, JsonRejection>,
) -> Result<CropPrediction, PredictionError> {
    let Json(request) = payload.map_err(|e| PredictionError::BadRequest(e.body_text()))?;
    let features = request.to_features();
    tracing::debug!("Crop features: {:?}", features);

    let model = state.models.crop.clone();
    let prediction = run_blocking(move || Ok(model.predict(&features)?)).await?;

    let crop = crop_name(&prediction.label)
        .ok_or_else(|| PredictionError::UnknownClass(format!("{:?}", prediction.label)))?;

    Ok(CropPrediction {
        crop,
        confidence: prediction.confidence(),
        image_url: CROP_IMAGE_URL.to_string(),
    })
}
