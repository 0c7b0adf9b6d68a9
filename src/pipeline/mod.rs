//! Pipeline stages for image-to-table extraction.
//!
//! Each submodule implements exactly one transformation step. Stages are
//! synchronous and single-pass: nothing retries, nothing loops back.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess ──▶ encode ──▶ ocr ──▶ reconstruct ──▶ classify
//! (path/URL)  (enhance)     (PNG)   (engine)  (rows/cells)   (result)
//! ```
//!
//! 1. [`input`]        read a local file or download a URL into memory
//! 2. [`preprocess`]   decode, grayscale, contrast, sharpen, blur
//! 3. [`encode`]       PNG-encode the bitmap for the engine
//! 4. [`ocr`]          run the recognition engine; map its diagnostics onto
//!    the failure taxonomy
//! 5. [`reconstruct`]  split raw text into rows and cells
//! 6. [`classify`]     wrap the outcome as an
//!    [`ExtractionResult`](crate::output::ExtractionResult)
//!
//! A failure in stages 2–4 short-circuits: [`reconstruct`] never sees it.

pub mod classify;
pub mod encode;
pub mod input;
pub mod ocr;
pub mod preprocess;
pub mod reconstruct;
