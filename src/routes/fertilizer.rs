use super::{record_outcome, run_blocking, PredictionError};
use crate::{
    catalog::{fertilizer_name, FERTILIZER_DESCRIPTION, FERTILIZER_IMAGE_URL},
    features::FertilizerRequest,
    server::SharedState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::instrument;

const ROUTE: &str = "fertilizer";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FertilizerPrediction {
    pub fertilizer: String,
    pub confidence: f64,
    pub description: String,
    pub image_url: String,
}

#[instrument(skip(state, payload))]
pub async fn predict_fertilizer(
    State(state): State<SharedState>,
    payload: Result<Json<FertilizerRequest>, JsonRejection>,
) -> Result<Json<FertilizerPrediction>, PredictionError> {
    let started = Instant::now();
    let result = recommend_fertilizer(&state, payload).await;
    record_outcome(&state.metrics, ROUTE, started, &result);
    result.map(Json)
}

async fn recommend_fertilizer(
    state: &SharedState,
    payload: Result<Json<FertilizerRequest>, JsonRejection>,
) -> Result<FertilizerPrediction, PredictionError> {
    let Json(request) = payload.map_err(|e| PredictionError::BadRequest(e.body_text()))?;
    if request.soil_code() < 0 || request.crop_code() < 0 {
        tracing::warn!(
            soil = %request.soil,
            crop = %request.crop,
            "Unknown categorical value, encoding as -1"
        );
    }
    let features = request.to_features();

    let model = state.models.fertilizer.clone();
    let prediction = run_blocking(move || Ok(model.predict(&features)?)).await?;

    Ok(FertilizerPrediction {
        fertilizer: fertilizer_name(&prediction.label),
        confidence: prediction.confidence(),
        description: FERTILIZER_DESCRIPTION.to_string(),
        image_url: FERTILIZER_IMAGE_URL.to_string(),
    })
}
