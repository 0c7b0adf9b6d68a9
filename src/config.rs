//! Configuration types for image-to-table extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The value objects it is made of
//! ([`PreprocessConfig`], [`RecognitionConfig`], [`TesseractSettings`]) are
//! plain serde types so they can be logged, stored, or loaded from a file.
//!
//! Every parameter has a fixed default that works for screenshots of
//! Korean/English spreadsheets; none of them are derived from the image.

use crate::error::Img2TableError;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::reconstruct::TableReconstructor;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for an extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use img2table::{ExtractionConfig, SegmentationMode, SplitPolicy};
///
/// let config = ExtractionConfig::builder()
///     .languages(["eng"])
///     .segmentation_mode(SegmentationMode::SingleBlock)
///     .split_policy(SplitPolicy::WideGap)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Image enhancement applied before recognition.
    pub preprocess: PreprocessConfig,

    /// Options handed to the OCR engine for every call.
    pub recognition: RecognitionConfig,

    /// How each recognised line is split into cells. Default: [`SplitPolicy::WhitespaceRun`].
    ///
    /// Independent of `preprocess.enabled`: switching preprocessing on or off
    /// never changes how lines are split unless the caller says so.
    pub split_policy: SplitPolicy,

    /// Settings for the built-in Tesseract adapter. Ignored when `engine` is set.
    pub tesseract: TesseractSettings,

    /// Pre-constructed OCR engine. Takes precedence over `tesseract`.
    pub engine: Option<Arc<dyn OcrEngine>>,

    /// Pre-constructed table reconstructor. Takes precedence over `split_policy`.
    pub reconstructor: Option<Arc<dyn TableReconstructor>>,

    /// Number of images processed at once by [`crate::convert::extract_many`]. Default: 4.
    ///
    /// Each extraction runs one engine process, which is CPU-bound; going much
    /// beyond the number of cores only adds contention.
    pub concurrency: usize,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Per-image progress events for batch runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessConfig::default(),
            recognition: RecognitionConfig::default(),
            split_policy: SplitPolicy::default(),
            tesseract: TesseractSettings::default(),
            engine: None,
            reconstructor: None,
            concurrency: 4,
            download_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("preprocess", &self.preprocess)
            .field("recognition", &self.recognition)
            .field("split_policy", &self.split_policy)
            .field("tesseract", &self.tesseract)
            .field("engine", &self.engine.as_ref().map(|_| "<dyn OcrEngine>"))
            .field(
                "reconstructor",
                &self.reconstructor.as_ref().map(|_| "<dyn TableReconstructor>"),
            )
            .field("concurrency", &self.concurrency)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn preprocess(mut self, preprocess: PreprocessConfig) -> Self {
        self.config.preprocess = preprocess;
        self
    }

    /// Turn the enhancement steps on or off (decoding always runs).
    pub fn preprocessing(mut self, enabled: bool) -> Self {
        self.config.preprocess.enabled = enabled;
        self
    }

    pub fn contrast(mut self, factor: f32) -> Self {
        self.config.preprocess.contrast = factor;
        self
    }

    pub fn sharpness(mut self, factor: f32) -> Self {
        self.config.preprocess.sharpness = factor;
        self
    }

    pub fn blur_radius(mut self, radius: f32) -> Self {
        self.config.preprocess.blur_radius = radius;
        self
    }

    pub fn recognition(mut self, recognition: RecognitionConfig) -> Self {
        self.config.recognition = recognition;
        self
    }

    /// Set the language list; duplicates are dropped, first occurrence wins.
    pub fn languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.recognition.languages = dedup_languages(languages);
        self
    }

    pub fn segmentation_mode(mut self, mode: SegmentationMode) -> Self {
        self.config.recognition.segmentation_mode = mode;
        self
    }

    pub fn preserve_interword_spacing(mut self, v: bool) -> Self {
        self.config.recognition.preserve_interword_spacing = v;
        self
    }

    pub fn split_policy(mut self, policy: SplitPolicy) -> Self {
        self.config.split_policy = policy;
        self
    }

    pub fn tesseract(mut self, settings: TesseractSettings) -> Self {
        self.config.tesseract = settings;
        self
    }

    pub fn tesseract_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.tesseract.program = program.into();
        self
    }

    pub fn tessdata_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tesseract.tessdata_dir = Some(dir.into());
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.tesseract.dpi = Some(dpi);
        self
    }

    /// Kill the engine process if one recognition call runs longer than this.
    pub fn engine_timeout(mut self, limit: Duration) -> Self {
        self.config.tesseract.timeout = Some(limit);
        self
    }

    pub fn engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.engine = Some(engine);
        self
    }

    pub fn reconstructor(mut self, reconstructor: Arc<dyn TableReconstructor>) -> Self {
        self.config.reconstructor = Some(reconstructor);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Img2TableError> {
        let c = &self.config;
        c.preprocess.validate()?;
        c.recognition.validate()?;
        c.tesseract.validate()?;
        if c.concurrency == 0 {
            return Err(Img2TableError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Preprocessing ────────────────────────────────────────────────────────

/// Fixed enhancement parameters for the preprocessor.
///
/// Factors follow the usual image-enhancement convention: `1.0` returns the
/// input unchanged, larger values exaggerate the effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Run grayscale/contrast/sharpness/blur. Default: true.
    pub enabled: bool,
    /// Contrast factor. Default: 2.0.
    pub contrast: f32,
    /// Sharpness factor. Default: 2.0.
    pub sharpness: f32,
    /// Gaussian blur radius (sigma) applied after sharpening. Default: 0.5.
    /// `0.0` skips the blur.
    pub blur_radius: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            contrast: 2.0,
            sharpness: 2.0,
            blur_radius: 0.5,
        }
    }
}

impl PreprocessConfig {
    /// Decode only; no enhancement.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), Img2TableError> {
        for (name, v) in [("contrast", self.contrast), ("sharpness", self.sharpness)] {
            if !v.is_finite() || !(0.0..=10.0).contains(&v) {
                return Err(Img2TableError::InvalidConfig(format!(
                    "{name} factor must be 0.0–10.0, got {v}"
                )));
            }
        }
        if !self.blur_radius.is_finite() || !(0.0..=5.0).contains(&self.blur_radius) {
            return Err(Img2TableError::InvalidConfig(format!(
                "Blur radius must be 0.0–5.0, got {}",
                self.blur_radius
            )));
        }
        Ok(())
    }
}

// ── Recognition ──────────────────────────────────────────────────────────

/// Options passed to the OCR engine. Constructed once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Engine language codes, recognised jointly. Default: `["kor", "eng"]`.
    pub languages: Vec<String>,
    /// Layout assumption. Default: [`SegmentationMode::SingleBlock`].
    pub segmentation_mode: SegmentationMode,
    /// Keep runs of spaces between words instead of collapsing them. Default: true.
    pub preserve_interword_spacing: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            languages: vec!["kor".to_string(), "eng".to_string()],
            segmentation_mode: SegmentationMode::default(),
            preserve_interword_spacing: true,
        }
    }
}

impl RecognitionConfig {
    /// Languages in the engine's joint form, e.g. `kor+eng`.
    pub fn language_spec(&self) -> String {
        self.languages.join("+")
    }

    pub fn validate(&self) -> Result<(), Img2TableError> {
        if self.languages.is_empty() {
            return Err(Img2TableError::InvalidConfig(
                "At least one recognition language is required".into(),
            ));
        }
        for lang in &self.languages {
            if lang.is_empty() || lang.contains('+') || lang.chars().any(char::is_whitespace) {
                return Err(Img2TableError::InvalidConfig(format!(
                    "Invalid language code '{lang}'"
                )));
            }
        }
        // Languages are an ordered set.
        for (i, lang) in self.languages.iter().enumerate() {
            if self.languages[..i].contains(lang) {
                return Err(Img2TableError::InvalidConfig(format!(
                    "Language '{lang}' is listed more than once"
                )));
            }
        }
        Ok(())
    }
}

fn dedup_languages<I, S>(languages: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for lang in languages {
        let lang = lang.into().trim().to_string();
        if !out.contains(&lang) {
            out.push(lang);
        }
    }
    out
}

/// How the engine should treat page layout.
///
/// Discriminants are the engine's page-segmentation codes. Grid-like tables
/// want [`SegmentationMode::SingleBlock`]: the page is read as one block of
/// aligned text, so column gaps survive instead of being reflowed as prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SegmentationMode {
    OsdOnly = 0,
    AutoOsd = 1,
    AutoOnly = 2,
    /// Fully automatic page segmentation.
    Auto = 3,
    SingleColumn = 4,
    SingleBlockVertical = 5,
    /// A single uniform block of text. (default)
    #[default]
    SingleBlock = 6,
    SingleLine = 7,
    SingleWord = 8,
    CircleWord = 9,
    SingleChar = 10,
    SparseText = 11,
    SparseTextOsd = 12,
    RawLine = 13,
}

impl SegmentationMode {
    pub fn from_code(code: u8) -> Result<Self, Img2TableError> {
        let mode = match code {
            0 => Self::OsdOnly,
            1 => Self::AutoOsd,
            2 => Self::AutoOnly,
            3 => Self::Auto,
            4 => Self::SingleColumn,
            5 => Self::SingleBlockVertical,
            6 => Self::SingleBlock,
            7 => Self::SingleLine,
            8 => Self::SingleWord,
            9 => Self::CircleWord,
            10 => Self::SingleChar,
            11 => Self::SparseText,
            12 => Self::SparseTextOsd,
            13 => Self::RawLine,
            _ => {
                return Err(Img2TableError::InvalidConfig(format!(
                    "Invalid page segmentation mode {code}; expected 0–13"
                )))
            }
        };
        Ok(mode)
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

// ── Reconstruction ───────────────────────────────────────────────────────

/// Cell-splitting rule applied to every non-blank line of engine output.
///
/// | Policy | Delimiter | Typical input |
/// |--------|-----------|---------------|
/// | `Tab` | literal `\t` only | engine approximates column gaps with tabs |
/// | `WhitespaceRun` | any run of spaces/tabs | enhanced images, space-separated tokens |
/// | `WideGap` | a tab, or 2+ consecutive whitespace | multi-word cells with preserved spacing |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitPolicy {
    Tab,
    /// (default)
    #[default]
    WhitespaceRun,
    WideGap,
}

// ── Engine ───────────────────────────────────────────────────────────────

/// Settings for [`crate::pipeline::ocr::TesseractEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TesseractSettings {
    /// Executable name or path. Default: `tesseract` (looked up on `PATH`).
    pub program: PathBuf,
    /// Directory holding `*.traineddata`; engine default when `None`.
    pub tessdata_dir: Option<PathBuf>,
    /// Resolution hint. Screenshots carry no DPI, which makes the engine
    /// guess; setting it silences that guess.
    pub dpi: Option<u32>,
    /// Upper bound for one engine run; the process is killed when it is
    /// exceeded. No limit when `None`.
    pub timeout: Option<Duration>,
}

impl Default for TesseractSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("tesseract"),
            tessdata_dir: None,
            dpi: None,
            timeout: None,
        }
    }
}

impl TesseractSettings {
    pub fn validate(&self) -> Result<(), Img2TableError> {
        if let Some(dpi) = self.dpi {
            if !(70..=2400).contains(&dpi) {
                return Err(Img2TableError::InvalidConfig(format!(
                    "DPI must be 70–2400, got {dpi}"
                )));
            }
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(Img2TableError::InvalidConfig(
                "Engine timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_table_extraction_setup() {
        let c = ExtractionConfig::default();
        assert!(c.preprocess.enabled);
        assert_eq!(c.preprocess.contrast, 2.0);
        assert_eq!(c.preprocess.sharpness, 2.0);
        assert_eq!(c.preprocess.blur_radius, 0.5);
        assert_eq!(c.recognition.language_spec(), "kor+eng");
        assert_eq!(c.recognition.segmentation_mode.code(), 6);
        assert!(c.recognition.preserve_interword_spacing);
        assert_eq!(c.split_policy, SplitPolicy::WhitespaceRun);
    }

    #[test]
    fn builder_dedups_languages() {
        let c = ExtractionConfig::builder()
            .languages(["eng", "kor", "eng"])
            .build()
            .unwrap();
        assert_eq!(c.recognition.languages, vec!["eng", "kor"]);
    }

    #[test]
    fn builder_rejects_empty_languages() {
        let empty: [&str; 0] = [];
        let err = ExtractionConfig::builder().languages(empty).build().unwrap_err();
        assert!(matches!(err, Img2TableError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_joined_language_code() {
        let err = ExtractionConfig::builder()
            .languages(["kor+eng"])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("kor+eng"));
    }

    #[test]
    fn builder_rejects_out_of_range_factor() {
        assert!(ExtractionConfig::builder().contrast(-1.0).build().is_err());
        assert!(ExtractionConfig::builder().sharpness(f32::NAN).build().is_err());
        assert!(ExtractionConfig::builder().blur_radius(9.0).build().is_err());
        assert!(ExtractionConfig::builder().blur_radius(0.0).build().is_ok());
    }

    #[test]
    fn segmentation_mode_codes_round_trip() {
        for code in 0..=13u8 {
            assert_eq!(SegmentationMode::from_code(code).unwrap().code(), code);
        }
        assert!(SegmentationMode::from_code(14).is_err());
    }

    #[test]
    fn builder_rejects_zero_concurrency() {
        let err = ExtractionConfig::builder().concurrency(0).build().unwrap_err();
        assert!(matches!(err, Img2TableError::InvalidConfig(_)));
        let c = ExtractionConfig::builder().concurrency(1).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_rejects_out_of_range_dpi() {
        assert!(ExtractionConfig::builder().dpi(69).build().is_err());
        assert!(ExtractionConfig::builder().dpi(2401).build().is_err());
        let c = ExtractionConfig::builder().dpi(300).build().unwrap();
        assert_eq!(c.tesseract.dpi, Some(300));
    }

    #[test]
    fn builder_rejects_zero_engine_timeout() {
        assert!(ExtractionConfig::builder()
            .engine_timeout(Duration::ZERO)
            .build()
            .is_err());
        let c = ExtractionConfig::builder()
            .engine_timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        assert_eq!(c.tesseract.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn duplicate_languages_in_recognition_config_are_rejected() {
        let recognition = RecognitionConfig {
            languages: vec!["kor".into(), "eng".into(), "kor".into()],
            ..RecognitionConfig::default()
        };
        let err = ExtractionConfig::builder()
            .recognition(recognition)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("'kor'"));
    }
}
