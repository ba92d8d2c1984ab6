mod crop;
mod disease;
mod error;
mod fertilizer;
mod health;
mod metrics;

pub use crop::CropPrediction;
pub use disease::DiseasePrediction;
pub use error::PredictionError;
pub use fertilizer::FertilizerPrediction;
pub use health::STATUS_MESSAGE;

use crate::{server::SharedState, telemetry::Metrics};
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Instant;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/predict/crop", post(crop::predict_crop))
        .route("/predict/fertilizer", post(fertilizer::predict_fertilizer))
        .route("/predict/disease", post(disease::predict_disease))
}

/// Runs CPU-bound preprocessing and inference off the async workers.
async fn run_blocking<T, F>(task: F) -> Result<T, PredictionError>
where
    F: FnOnce() -> Result<T, PredictionError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| PredictionError::Task(e.to_string()))?
}

fn record_outcome<T>(
    metrics: &Metrics,
    route: &str,
    started: Instant,
    result: &Result<T, PredictionError>,
) {
    metrics.record_request(route);
    metrics.record_prediction_duration(started.elapsed().as_millis() as u64, route);
    if result.is_err() {
        metrics.record_error(route);
    }
}
