//! # img2table
//!
//! Extract tabular data from a screenshot or photo of a spreadsheet.
//!
//! The crate enhances the image, runs an OCR engine on it (Tesseract by
//! default) and rebuilds rows and cells from the recognised text. Every call
//! returns a structured [`ExtractionResult`]: either the table, or a failure
//! with a kind, a concise message and the engine's diagnostic trace.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image
//!  │
//!  ├─ 1. Input        read local file or download from URL
//!  ├─ 2. Preprocess   grayscale → contrast → sharpen → blur
//!  ├─ 3. Encode       PNG for the engine's stdin
//!  ├─ 4. OCR          tesseract -l kor+eng --psm 6 (blocking pool)
//!  ├─ 5. Reconstruct  lines → rows, split policy → cells
//!  └─ 6. Classify     Success { table } | Failure { kind, message, diagnostics }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use img2table::{extract_file, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let result = extract_file("sheet.png", &config).await?;
//!     match result.into_result() {
//!         Ok(table) => {
//!             for row in table.rows() {
//!                 println!("{}", row.join(" | "));
//!             }
//!         }
//!         Err(failure) => eprintln!("{failure}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2table` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! img2table = { version = "0.1", default-features = false }
//! ```
//!
//! ## Plugging in another engine
//!
//! Implement [`OcrEngine`] and set it with
//! [`ExtractionConfigBuilder::engine`]. The pipeline never looks at engine
//! specifics beyond that trait.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, PreprocessConfig, RecognitionConfig,
    SegmentationMode, SplitPolicy, TesseractSettings,
};
pub use convert::{engine_info, extract, extract_file, extract_many, extract_sync, extract_to_file};
pub use error::{Img2TableError, StageError};
pub use format::OutputFormat;
pub use output::{Diagnostics, EngineInfo, ExtractionResult, Failure, FailureKind, Table};
pub use pipeline::ocr::{OcrEngine, TesseractEngine};
pub use pipeline::preprocess::{PreprocessedImage, RawImage};
pub use pipeline::reconstruct::{LineSplitter, TableReconstructor};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
