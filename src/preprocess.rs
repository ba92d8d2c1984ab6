use image::{imageops::FilterType, ImageFormat};
use ndarray::{Array, Ix4};
use thiserror::Error;

const ACCEPTED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

#[derive(Error, Debug, PartialEq)]
pub enum ImageError {
    #[error("Invalid file type `{0}`. Only JPEG and PNG images are accepted.")]
    ContentType(String),
    #[error("Image is {size} bytes, the limit is {limit} bytes.")]
    TooLarge { size: usize, limit: usize },
    #[error("Unsupported image format {0}. Only JPEG and PNG images are accepted.")]
    UnsupportedFormat(String),
    #[error("Error decoding image: {0}")]
    Decode(String),
}

/// Checks the declared content type of an upload, ignoring parameters and case.
pub fn validate_content_type(content_type: Option<&str>) -> Result<(), ImageError> {
    let declared = content_type.unwrap_or_default();
    let essence = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if ACCEPTED_CONTENT_TYPES.contains(&essence.as_str()) {
        Ok(())
    } else {
        Err(ImageError::ContentType(declared.to_string()))
    }
}

pub fn validate_size(size: usize, limit: usize) -> Result<(), ImageError> {
    if size > limit {
        return Err(ImageError::TooLarge { size, limit });
    }
    Ok(())
}

/// Decodes JPEG/PNG bytes into a `(1, size, size, 3)` RGB batch scaled to [0, 1].
pub fn transform_image(image_data: &[u8], size: u32) -> Result<Array<f32, Ix4>, ImageError> {
    let format = image::guess_format(image_data).map_err(|e| ImageError::Decode(e.to_string()))?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(ImageError::UnsupportedFormat(format!("{:?}", format)));
    }

    let original_img = image::load_from_memory_with_format(image_data, format)
        .map_err(|e| ImageError::Decode(e.to_string()))?;

    let img = original_img
        .resize_exact(size, size, FilterType::CatmullRom)
        .to_rgb8();

    let side = size as usize;
    let mut input = Array::zeros((1, side, side, 3));
    for (x, y, pixel) in img.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input[[0, y, x, 0]] = (r as f32) / 255.;
        input[[0, y, x, 1]] = (g as f32) / 255.;
        input[[0, y, x, 2]] = (b as f32) / 255.;
    }

    Ok(input)
}
