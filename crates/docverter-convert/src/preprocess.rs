//! Image cleanup before OCR.
//!
//! Grayscale, Gaussian blur, adaptive threshold, then polarity correction so
//! the OCR engine always sees dark text on a light background.

use docverter_core::ConversionError;
use image::GrayImage;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Blur strength applied before thresholding.
pub const BLUR_SIGMA: f32 = 1.0;

/// Neighbourhood radius of the adaptive threshold, in pixels.
pub const THRESHOLD_BLOCK_RADIUS: u32 = 15;

/// Whether image preprocessing is compiled in.
#[must_use]
pub fn is_available() -> bool {
    cfg!(feature = "preprocess")
}

/// Binarize a grayscale image.
#[cfg(feature = "preprocess")]
#[must_use]
pub fn binarize(gray: &GrayImage) -> GrayImage {
    let blurred = imageproc::filter::gaussian_blur_f32(gray, BLUR_SIGMA);
    let mut binary = imageproc::contrast::adaptive_threshold(&blurred, THRESHOLD_BLOCK_RADIUS);
    if mostly_dark(&binary) {
        image::imageops::invert(&mut binary);
    }
    binary
}

/// More than half of the pixels are black.
#[cfg_attr(not(feature = "preprocess"), allow(dead_code))]
fn mostly_dark(image: &GrayImage) -> bool {
    let dark = image.pixels().filter(|p| p.0[0] < 128).count();
    let total = image.width() as usize * image.height() as usize;
    dark * 2 > total
}

/// Write a cleaned-up PNG copy of `input` into `output_dir`.
pub fn preprocess_image(input: &Path, output_dir: &Path) -> Result<PathBuf, ConversionError> {
    #[cfg(feature = "preprocess")]
    {
        let gray = image::open(input)
            .map_err(|e| ConversionError::Parse(format!("image decode failed: {e}")))?
            .to_luma8();
        let binary = binarize(&gray);
        let output = output_dir.join("preprocessed.png");
        binary
            .save(&output)
            .map_err(|e| ConversionError::Failed(format!("cannot write preprocessed image: {e}")))?;
        debug!(
            "Preprocessed {:?} ({}x{}) into {:?}",
            input,
            binary.width(),
            binary.height(),
            output
        );
        Ok(output)
    }
    #[cfg(not(feature = "preprocess"))]
    {
        debug!("Preprocessing not compiled in, skipping {:?}", input);
        let _ = output_dir;
        Err(ConversionError::Failed(
            "image preprocessing not available".to_string(),
        ))
    }
}
