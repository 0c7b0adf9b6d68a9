//! End-to-end integration tests against a real Tesseract install.
//!
//! They are gated behind the `E2E_ENABLED` environment variable so they do
//! not run in CI unless explicitly requested. Screenshots placed in
//! `./test_cases/*.png` are extracted as well when present.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use image::{GrayImage, Luma};
use img2table::{
    engine_info, extract_file, extract_many, extract_sync, ExtractionConfig, FailureKind,
    OutputFormat, RawImage,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP - set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

fn blank_page() -> RawImage {
    RawImage::from(image::DynamicImage::ImageLuma8(GrayImage::from_pixel(
        200,
        80,
        Luma([255]),
    )))
}

fn english_only() -> ExtractionConfig {
    ExtractionConfig::builder()
        .languages(["eng"])
        .dpi(300)
        .build()
        .unwrap()
}

// ── Engine ───────────────────────────────────────────────────────────────────

#[test]
fn test_engine_info() {
    e2e_skip_unless_enabled!();
    let info = engine_info(&ExtractionConfig::default()).expect("tesseract installed");
    println!("{} - languages: {:?}", info.version, info.languages);
    assert!(info.version.to_lowercase().contains("tesseract"));
    assert!(info.languages.iter().any(|l| l == "eng"));
}

#[test]
fn test_blank_image_is_empty_success() {
    e2e_skip_unless_enabled!();
    let result = extract_sync(&blank_page(), &english_only());
    let table = result.into_result().expect("blank page should not fail");
    assert!(table.is_empty(), "unexpected rows: {:?}", table.rows());
}

#[test]
fn test_unknown_language_is_recognition_error() {
    e2e_skip_unless_enabled!();
    let config = ExtractionConfig::builder()
        .languages(["zzz"])
        .build()
        .unwrap();
    let result = extract_sync(&blank_page(), &config);
    let failure = result.failure().expect("must fail");
    assert_eq!(failure.kind, FailureKind::RecognitionError);
    assert_eq!(failure.diagnostics.category, "LanguageDataMissing");
    assert!(!failure.diagnostics.trace.is_empty());
}

#[test]
fn test_missing_binary_is_engine_unavailable() {
    e2e_skip_unless_enabled!();
    let config = ExtractionConfig::builder()
        .tesseract_program("/nonexistent/tesseract")
        .build()
        .unwrap();
    let result = extract_sync(&blank_page(), &config);
    assert_eq!(
        result.failure().map(|f| f.kind),
        Some(FailureKind::EngineUnavailable)
    );
}

// ── Real screenshots ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_extract_test_cases() {
    e2e_skip_unless_enabled!();
    let Ok(entries) = std::fs::read_dir(test_cases_dir()) else {
        println!("SKIP - no test_cases directory");
        return;
    };
    let inputs: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| OutputFormat::from_path(p).is_none())
        .filter(|p| p.is_file())
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    if inputs.is_empty() {
        println!("SKIP - test_cases is empty");
        return;
    }

    let config = ExtractionConfig::default();
    for (input, result) in inputs.iter().zip(extract_many(&inputs, &config).await) {
        let result = result.expect("input readable");
        match result.table() {
            Some(table) => {
                println!("{input}: {} rows", table.row_count());
                print!("{}", OutputFormat::Markdown.render_table(table));
            }
            None => panic!("{input}: {}", result.failure().unwrap()),
        }
    }
}

#[tokio::test]
async fn test_extract_file_nonexistent() {
    e2e_skip_unless_enabled!();
    assert!(extract_file("/tmp/nope-img2table.png", &english_only())
        .await
        .is_err());
}
