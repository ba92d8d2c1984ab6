use axum::{response::IntoResponse, response::Json};
use serde::{Deserialize, Serialize};

pub const STATUS_MESSAGE: &str = "AgriHelp ML API is running.";

#[derive(Serialize, Deserialize)]
pub struct Status {
    message: String,
}

pub async fn healthcheck() -> impl IntoResponse {
    Json(Status {
        message: STATUS_MESSAGE.into(),
    })
}
