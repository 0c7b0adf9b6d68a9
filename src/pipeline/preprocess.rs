//! Image preprocessing: raw bytes → enhanced single-channel bitmap.
//!
//! Screenshots of spreadsheets are often JPEG-compressed and low resolution;
//! OCR accuracy on them drops sharply without contrast normalisation. The
//! steps run in a fixed order:
//!
//! ```text
//! decode ──▶ grayscale ──▶ contrast ×2.0 ──▶ sharpness ×2.0 ──▶ blur σ0.5
//! ```
//!
//! The blur after sharpening is deliberate: sharpening alone amplifies
//! compression artefacts, and a sub-pixel Gaussian takes the edge off them
//! without softening glyph strokes.

use crate::config::PreprocessConfig;
use crate::error::StageError;
use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use std::path::Path;
use tracing::debug;

/// An input image, owned by the caller until handed to the pipeline.
#[derive(Debug, Clone)]
pub enum RawImage {
    /// Encoded bytes in any supported format (PNG, JPEG, BMP, GIF, TIFF, WebP).
    Encoded(Vec<u8>),
    /// An image the caller already decoded.
    Decoded(DynamicImage),
}

impl RawImage {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        RawImage::Encoded(bytes.into())
    }

    /// Read an image file into memory without decoding it.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(RawImage::Encoded(std::fs::read(path)?))
    }
}

impl From<Vec<u8>> for RawImage {
    fn from(bytes: Vec<u8>) -> Self {
        RawImage::Encoded(bytes)
    }
}

impl From<DynamicImage> for RawImage {
    fn from(img: DynamicImage) -> Self {
        RawImage::Decoded(img)
    }
}

/// The bitmap handed to the OCR engine.
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    image: DynamicImage,
    enhanced: bool,
}

impl PreprocessedImage {
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Whether the enhancement steps ran (false when preprocessing is disabled).
    pub fn is_enhanced(&self) -> bool {
        self.enhanced
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Decode and enhance `raw` for recognition.
///
/// Decoding always runs so that corrupt input fails here, as
/// [`StageError::InvalidImage`], whether or not enhancement is enabled.
pub fn preprocess(raw: &RawImage, config: &PreprocessConfig) -> Result<PreprocessedImage, StageError> {
    let decoded = decode(raw)?;
    let (w, h) = decoded.dimensions();
    if w == 0 || h == 0 {
        return Err(StageError::InvalidImage {
            category: "EmptyImage".to_string(),
            message: format!("Image has zero area ({w}x{h})"),
            trace: String::new(),
        });
    }

    if !config.enabled {
        debug!("Preprocessing disabled; passing {}x{} image through", w, h);
        return Ok(PreprocessedImage {
            image: decoded,
            enhanced: false,
        });
    }

    let gray = to_grayscale(&decoded);
    let gray = enhance_contrast(&gray, config.contrast);
    let gray = enhance_sharpness(&gray, config.sharpness);
    let gray = gaussian_blur(&gray, config.blur_radius);
    debug!(
        "Preprocessed {}x{} image (contrast {}, sharpness {}, blur {})",
        w, h, config.contrast, config.sharpness, config.blur_radius
    );

    Ok(PreprocessedImage {
        image: DynamicImage::ImageLuma8(gray),
        enhanced: true,
    })
}

fn decode(raw: &RawImage) -> Result<DynamicImage, StageError> {
    match raw {
        RawImage::Decoded(img) => Ok(img.clone()),
        RawImage::Encoded(bytes) if bytes.is_empty() => Err(StageError::InvalidImage {
            category: "EmptyInput".to_string(),
            message: "Image data is empty".to_string(),
            trace: String::new(),
        }),
        RawImage::Encoded(bytes) => {
            let img = image::load_from_memory(bytes).map_err(|e| StageError::from_image_error(&e))?;
            debug!("Decoded {} bytes → {}x{} px", bytes.len(), img.width(), img.height());
            Ok(img)
        }
    }
}

/// Single-channel luminance. Transparent pixels are composited over white.
pub(crate) fn to_grayscale(img: &DynamicImage) -> GrayImage {
    if !img.color().has_alpha() {
        return img.to_luma8();
    }
    let la = img.to_luma_alpha8();
    GrayImage::from_fn(la.width(), la.height(), |x, y| {
        let [l, a] = la.get_pixel(x, y).0;
        let a = a as u32;
        let v = (l as u32 * a + 255 * (255 - a) + 127) / 255;
        Luma([v as u8])
    })
}

/// Push every pixel away from the image's mean luminance by `factor`.
pub(crate) fn enhance_contrast(img: &GrayImage, factor: f32) -> GrayImage {
    if factor == 1.0 || img.is_empty() {
        return img.clone();
    }
    let sum: u64 = img.pixels().map(|p| p.0[0] as u64).sum();
    let count = img.width() as u64 * img.height() as u64;
    let mean = ((sum as f64 / count as f64) + 0.5).floor() as f32;

    let mut out = img.clone();
    for p in out.pixels_mut() {
        p.0[0] = blend(mean, p.0[0] as f32, factor);
    }
    out
}

/// Push every pixel away from a 3×3 smoothed copy of itself by `factor`.
///
/// Border pixels have no full neighbourhood and are left as they are.
pub(crate) fn enhance_sharpness(img: &GrayImage, factor: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    if factor == 1.0 || w < 3 || h < 3 {
        return img.clone();
    }
    const SMOOTH: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];
    let smooth: GrayImage = image::imageops::filter3x3(img, &SMOOTH);

    let mut out = img.clone();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let orig = img.get_pixel(x, y).0[0] as f32;
            let base = smooth.get_pixel(x, y).0[0] as f32;
            out.put_pixel(x, y, Luma([blend(base, orig, factor)]));
        }
    }
    out
}

pub(crate) fn gaussian_blur(img: &GrayImage, radius: f32) -> GrayImage {
    if radius <= 0.0 {
        return img.clone();
    }
    image::imageops::blur(img, radius)
}

/// `base + factor * (value - base)`, rounded and clamped to a byte.
fn blend(base: f32, value: f32, factor: f32) -> u8 {
    (base + factor * (value - base)).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, LumaA, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode png");
        buf
    }

    fn gradient(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([((x * 20 + y * 7) % 256) as u8]))
    }

    #[test]
    fn corrupt_bytes_are_invalid_image() {
        let raw = RawImage::from_bytes(b"\x89PNG\r\n\x1a\nthis is not really a png".to_vec());
        let err = preprocess(&raw, &PreprocessConfig::default()).unwrap_err();
        assert_eq!(err.kind(), crate::output::FailureKind::InvalidImage);
    }

    #[test]
    fn empty_bytes_are_invalid_image() {
        let err = preprocess(&RawImage::from_bytes(Vec::new()), &PreprocessConfig::default())
            .unwrap_err();
        assert_eq!(err.category(), "EmptyInput");
    }

    #[test]
    fn corrupt_bytes_fail_even_when_disabled() {
        let raw = RawImage::from_bytes(b"garbage".to_vec());
        assert!(preprocess(&raw, &PreprocessConfig::disabled()).is_err());
    }

    #[test]
    fn output_is_single_channel() {
        let rgb = RgbImage::from_pixel(8, 6, Rgb([200, 10, 10]));
        let raw = RawImage::from_bytes(png_bytes(&DynamicImage::ImageRgb8(rgb)));
        let out = preprocess(&raw, &PreprocessConfig::default()).unwrap();
        assert!(out.is_enhanced());
        assert!(matches!(out.image(), DynamicImage::ImageLuma8(_)));
        assert_eq!(out.dimensions(), (8, 6));
    }

    #[test]
    fn disabled_passes_decoded_image_through() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])));
        let out = preprocess(&RawImage::from(rgb.clone()), &PreprocessConfig::disabled()).unwrap();
        assert!(!out.is_enhanced());
        assert_eq!(out.image(), &rgb);
    }

    #[test]
    fn identity_factors_only_convert_to_grayscale() {
        let gray = gradient(10, 10);
        let cfg = PreprocessConfig {
            enabled: true,
            contrast: 1.0,
            sharpness: 1.0,
            blur_radius: 0.0,
        };
        let out = preprocess(&RawImage::from(DynamicImage::ImageLuma8(gray.clone())), &cfg).unwrap();
        assert_eq!(out.image().to_luma8(), gray);
    }

    #[test]
    fn contrast_pushes_pixels_away_from_mean() {
        // mean = 128
        let img = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 100 } else { 156 }]));
        let out = enhance_contrast(&img, 2.0);
        assert_eq!(out.get_pixel(0, 0).0[0], 72);
        assert_eq!(out.get_pixel(1, 0).0[0], 184);
    }

    #[test]
    fn contrast_clamps_to_byte_range() {
        let img = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 0 } else { 255 }]));
        let out = enhance_contrast(&img, 3.0);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn sharpness_leaves_flat_regions_and_borders_alone() {
        let flat = GrayImage::from_pixel(5, 5, Luma([90]));
        assert_eq!(enhance_sharpness(&flat, 2.0), flat);

        let mut spot = GrayImage::from_pixel(5, 5, Luma([0]));
        spot.put_pixel(2, 2, Luma([130]));
        let out = enhance_sharpness(&spot, 2.0);
        // smoothed centre = 130*5/13 = 50; 50 + 2*(130-50) = 210
        assert_eq!(out.get_pixel(2, 2).0[0], 210);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(4, 2).0[0], 0);
    }

    #[test]
    fn zero_blur_is_identity() {
        let img = gradient(6, 6);
        assert_eq!(gaussian_blur(&img, 0.0), img);
    }

    #[test]
    fn transparent_pixels_become_white() {
        let la = image::GrayAlphaImage::from_pixel(2, 2, LumaA([0, 0]));
        let gray = to_grayscale(&DynamicImage::ImageLumaA8(la));
        assert!(gray.pixels().all(|p| p.0[0] == 255));
    }
}
