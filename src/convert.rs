//! Extraction entry points.
//!
//! [`extract_sync`] is the core: it runs the staged pipeline on one image
//! and always returns an [`ExtractionResult`]. Everything else wraps it:
//!
//! | Function | Input | Adds |
//! |----------|-------|------|
//! | [`extract`] | `RawImage` | runs on tokio's blocking pool |
//! | [`extract_file`] | path or URL | input resolution |
//! | [`extract_many`] | many paths/URLs | bounded concurrency, progress events |
//! | [`extract_to_file`] | path or URL | rendering + atomic write |
//!
//! `Err(Img2TableError)` is reserved for problems outside the pipeline
//! (missing file, failed download, unwritable output). A corrupt image or a
//! broken engine is a `Failure` result, not an `Err`.

use crate::config::ExtractionConfig;
use crate::error::{Img2TableError, StageError};
use crate::format::OutputFormat;
use crate::output::{EngineInfo, ExtractionResult, Table};
use crate::pipeline::classify::classify;
use crate::pipeline::input;
use crate::pipeline::ocr::{OcrEngine, TesseractEngine};
use crate::pipeline::preprocess::{preprocess, RawImage};
use crate::pipeline::reconstruct::{LineSplitter, TableReconstructor};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Run the pipeline on one image.
///
/// Blocks for the duration of the engine call. Never panics on bad input or
/// engine failure; both come back as [`ExtractionResult::Failure`].
pub fn extract_sync(image: &RawImage, config: &ExtractionConfig) -> ExtractionResult {
    let start = Instant::now();
    let engine = resolve_engine(config);
    let reconstructor = resolve_reconstructor(config);

    let result = classify(run_stages(
        image,
        config,
        engine.as_ref(),
        reconstructor.as_ref(),
    ));

    match &result {
        ExtractionResult::Success { table } => info!(
            "Extracted {} rows (max {} cols) in {}ms",
            table.row_count(),
            table.max_columns(),
            start.elapsed().as_millis()
        ),
        ExtractionResult::Failure(f) => info!(
            "Extraction failed in {}ms: {}",
            start.elapsed().as_millis(),
            f
        ),
    }
    result
}

/// Run the pipeline on one image without blocking the async executor.
///
/// # Errors
/// Only [`Img2TableError::Internal`], if the blocking task panicked.
pub async fn extract(
    image: RawImage,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, Img2TableError> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || extract_sync(&image, &config))
        .await
        .map_err(|e| Img2TableError::Internal(format!("Extraction task failed: {e}")))
}

/// Extract a table from a local image file or HTTP/HTTPS URL.
///
/// # Errors
/// Returns `Err` when the input cannot be read or downloaded. Pipeline
/// failures are reported inside the `Ok` result.
pub async fn extract_file(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, Img2TableError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);
    let raw = input::resolve_input(input_str, config.download_timeout_secs).await?;
    extract(raw, config).await
}

/// Extract tables from several inputs, at most `config.concurrency` at once.
///
/// Results are returned in input order regardless of completion order. One
/// input failing never affects the others.
pub async fn extract_many<I, S>(
    inputs: I,
    config: &ExtractionConfig,
) -> Vec<Result<ExtractionResult, Img2TableError>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let inputs: Vec<String> = inputs
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect();
    let total = inputs.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut results: Vec<(usize, Result<ExtractionResult, Img2TableError>)> =
        stream::iter(inputs.iter().enumerate().map(|(idx, input)| async move {
            if let Some(ref cb) = config.progress_callback {
                cb.on_image_start(idx, total, input);
            }
            let result = extract_file(input, config).await;
            if let Some(ref cb) = config.progress_callback {
                match &result {
                    Ok(ExtractionResult::Success { table }) => {
                        cb.on_image_complete(idx, total, table.row_count())
                    }
                    Ok(ExtractionResult::Failure(f)) => {
                        cb.on_image_error(idx, total, &f.to_string())
                    }
                    Err(e) => cb.on_image_error(idx, total, &e.to_string()),
                }
            }
            (idx, result)
        }))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|(idx, _)| *idx);

    let success = results
        .iter()
        .filter(|(_, r)| matches!(r, Ok(res) if res.is_success()))
        .count();
    info!("Batch complete: {}/{} images extracted", success, total);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, success);
    }

    results.into_iter().map(|(_, r)| r).collect()
}

/// Extract a table and write it to `output_path` in the given format.
///
/// Uses atomic write (temp file + rename) to prevent partial files. Nothing
/// is written when the format cannot represent the result (a failure in any
/// format other than JSON); the result is returned either way.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    format: OutputFormat,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, Img2TableError> {
    let result = extract_file(input_str, config).await?;
    let path = output_path.as_ref();

    match format.render(&result) {
        Some(rendered) => {
            write_atomic(path, format, rendered.as_bytes()).await?;
            info!("Wrote {} output to {}", format, path.display());
        }
        None => debug!("Not writing {}: {} cannot represent a failure", path.display(), format),
    }

    Ok(result)
}

/// Query the configured Tesseract binary for its version and languages.
///
/// Blocking; runs two short engine processes.
pub fn engine_info(config: &ExtractionConfig) -> Result<EngineInfo, StageError> {
    let engine = TesseractEngine::new(config.tesseract.clone());
    Ok(EngineInfo {
        version: engine.version()?,
        languages: engine.list_languages()?,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Preprocess, recognise, reconstruct. The first failure short-circuits:
/// if the engine fails the reconstructor is never called.
fn run_stages(
    image: &RawImage,
    config: &ExtractionConfig,
    engine: &dyn OcrEngine,
    reconstructor: &dyn TableReconstructor,
) -> Result<Table, StageError> {
    let t = Instant::now();
    let pre = preprocess(image, &config.preprocess)?;
    let (w, h) = pre.dimensions();
    debug!("Preprocessed {}x{} in {}ms", w, h, t.elapsed().as_millis());

    let t = Instant::now();
    let text = engine.recognize(&pre, &config.recognition)?;
    debug!(
        "{} returned {} bytes in {}ms",
        engine.name(),
        text.len(),
        t.elapsed().as_millis()
    );

    let table = reconstructor.reconstruct(&text);
    debug!("Reconstructed {} rows", table.row_count());
    Ok(table)
}

/// Caller-supplied engine first, otherwise the Tesseract adapter.
fn resolve_engine(config: &ExtractionConfig) -> Arc<dyn OcrEngine> {
    match config.engine {
        Some(ref engine) => Arc::clone(engine),
        None => Arc::new(TesseractEngine::new(config.tesseract.clone())),
    }
}

/// Caller-supplied reconstructor first, otherwise a [`LineSplitter`] with
/// the configured split policy.
fn resolve_reconstructor(config: &ExtractionConfig) -> Arc<dyn TableReconstructor> {
    match config.reconstructor {
        Some(ref r) => Arc::clone(r),
        None => Arc::new(LineSplitter::new(config.split_policy)),
    }
}

async fn write_atomic(path: &Path, format: OutputFormat, bytes: &[u8]) -> Result<(), Img2TableError> {
    let write_err = |e: std::io::Error| Img2TableError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension(format!("{}.tmp", format.extension()));
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
