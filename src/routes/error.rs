use crate::{model_service::ModelError, preprocess::ImageError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    Image(#[from] ImageError),
    #[error("{0}")]
    Model(#[from] ModelError),
    #[error("Model returned an unknown class label: {0}")]
    UnknownClass(String),
    #[error("Prediction task failed: {0}")]
    Task(String),
}

impl PredictionError {
    pub fn status(&self) -> StatusCode {
        match self {
            PredictionError::BadRequest(_) | PredictionError::Image(_) => StatusCode::BAD_REQUEST,
            PredictionError::Model(_)
            | PredictionError::UnknownClass(_)
            | PredictionError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PredictionError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Prediction failed: {}", self);
        } else {
            tracing::warn!("Rejected prediction request: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}
