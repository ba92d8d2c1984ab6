mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod catalog;
pub mod config;
pub mod features;
pub mod model_service;
pub mod ort_service;
pub mod preprocess;
pub mod state;

pub use app::start_app;
pub use routes::{CropPrediction, DiseasePrediction, FertilizerPrediction, PredictionError};
pub use server::{build_router, SharedState};
pub use telemetry::Metrics;
