//! Image encoding: preprocessed bitmap → PNG bytes for the engine's stdin.
//!
//! PNG is lossless; re-encoding the enhanced bitmap as JPEG would bring back
//! exactly the compression artefacts the preprocessor just suppressed.

use crate::error::StageError;
use crate::pipeline::preprocess::PreprocessedImage;
use std::io::Cursor;
use tracing::debug;

/// Encode the preprocessed image as PNG.
///
/// Fails only if the encoder itself fails, which is reported as a broken
/// pipe to the engine rather than a bad input image.
pub fn encode_png(img: &PreprocessedImage) -> Result<Vec<u8>, StageError> {
    let mut buf = Vec::new();
    img.image()
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| StageError::EngineUnavailable {
            category: "EncodingFailed".to_string(),
            message: format!("Could not encode image for the OCR engine: {e}"),
            trace: format!("{e:?}"),
        })?;

    debug!("Encoded image → {} bytes PNG", buf.len());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreprocessConfig;
    use crate::pipeline::preprocess::{preprocess, RawImage};
    use image::{DynamicImage, Luma, GrayImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([255])));
        let pre = preprocess(&RawImage::from(img), &PreprocessConfig::default()).unwrap();
        let png = encode_png(&pre).expect("encode should succeed");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&png).expect("valid png");
        assert_eq!(decoded.width(), 10);
    }
}
