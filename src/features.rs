use crate::catalog::{encode_category, CROP_TYPES, SOIL_TYPES};
use serde::Deserialize;

pub const CROP_FEATURES: usize = 7;
pub const FERTILIZER_FEATURES: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct CropRequest {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub rainfall: f64,
}

impl CropRequest {
    pub fn to_features(&self) -> [f32; CROP_FEATURES] {
        [
            self.nitrogen,
            self.phosphorus,
            self.potassium,
            self.temperature,
            self.humidity,
            self.ph,
            self.rainfall,
        ]
        .map(|value| value as f32)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FertilizerRequest {
    pub temperature: f64,
    pub moisture: f64,
    pub rainfall: f64,
    pub ph: f64,
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub carbon: f64,
    pub soil: String,
    pub crop: String,
}

impl FertilizerRequest {
    pub fn soil_code(&self) -> i64 {
        encode_category(&self.soil, &SOIL_TYPES)
    }

    pub fn crop_code(&self) -> i64 {
        encode_category(&self.crop, &CROP_TYPES)
    }

    pub fn to_features(&self) -> [f32; FERTILIZER_FEATURES] {
        [
            self.temperature,
            self.moisture,
            self.rainfall,
            self.ph,
            self.nitrogen,
            self.phosphorus,
            self.potassium,
            self.carbon,
            self.soil_code() as f64,
            self.crop_code() as f64,
        ]
        .map(|value| value as f32)
    }
}
