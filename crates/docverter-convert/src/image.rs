//! Image inspection.

use docverter_core::{ConversionError, Metadata};
use image::GenericImageView;
use serde_json::Value;
use std::path::Path;

/// Width, height and detected format of an image file.
pub fn image_metadata(path: &Path) -> Result<Metadata, ConversionError> {
    let bytes = std::fs::read(path)?;
    let (width, height, format) = decode_image_metadata(&bytes)?;

    let mut metadata = Metadata::new();
    metadata.insert("width".to_string(), Value::from(width));
    metadata.insert("height".to_string(), Value::from(height));
    metadata.insert("format".to_string(), Value::from(format));
    Ok(metadata)
}

/// Decode image to get dimensions and format.
fn decode_image_metadata(bytes: &[u8]) -> Result<(u32, u32, String), ConversionError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ConversionError::Parse(format!("failed to load image: {e}")))?;
    let (width, height) = img.dimensions();

    let format = image::guess_format(bytes).map_or_else(
        |_| "unknown".to_string(),
        |f| format!("{f:?}").to_lowercase(),
    );

    Ok((width, height, format))
}
