//! CLI binary for img2table.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use img2table::{
    engine_info, extract_file, extract_many, extract_to_file, ExtractionConfig,
    ExtractionProgressCallback, ExtractionResult, Failure, OutputFormat, ProgressCallback,
    SegmentationMode, SplitPolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback for batch runs. Images complete out of order,
/// so each line names the image it belongs to.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-image start times for elapsed reporting, keyed by batch index.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Input names, keyed by batch index.
    names: Mutex<HashMap<usize, String>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} images  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            names: Mutex::new(HashMap::new()),
        })
    }

    /// Elapsed seconds and display name for a finished image.
    fn finish(&self, index: usize) -> (f64, String) {
        let elapsed = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let name = self
            .names
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .unwrap_or_else(|| format!("#{}", index + 1));
        (elapsed, name)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting tables from {total} images…"))
        ));
    }

    fn on_image_start(&self, index: usize, _total: usize, input: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        if let Ok(mut m) = self.names.lock() {
            m.insert(index, input.to_string());
        }
        self.bar.set_message(input.to_string());
    }

    fn on_image_complete(&self, index: usize, _total: usize, rows: usize) {
        let (elapsed, name) = self.finish(index);
        self.bar.println(format!(
            "  {} {:<40}  {}  {}",
            green("✓"),
            name,
            dim(&format!("{rows:>4} rows")),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, index: usize, _total: usize, error: &str) {
        let (elapsed, name) = self.finish(index);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<40}  {}  {}",
            red("✗"),
            name,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} images extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images extracted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a table as JSON (stdout)
  img2table sheet.png

  # Markdown table into a file (format inferred from the extension)
  img2table sheet.png -o sheet.md

  # English only, keep multi-word cells together
  img2table --lang eng --split wide-gap invoice.jpg --format csv

  # Raw engine behaviour: no enhancement, tab-delimited cells
  img2table --no-preprocess --split tab scan.png

  # Many images into a directory, 8 at a time
  img2table shots/*.png -o tables/ --format csv -c 8

  # From a URL
  img2table https://example.com/sheet.png --format html

  # Check the installed engine and its language data
  img2table --engine-info

SPLIT POLICIES:
  tab         split strictly on tab characters
  whitespace  split on any run of spaces/tabs (default)
  wide-gap    split on tabs or 2+ spaces; single spaces stay inside a cell

ENVIRONMENT VARIABLES:
  IMG2TABLE_*   every flag has an override, e.g. IMG2TABLE_LANG=eng
  RUST_LOG      tracing filter, e.g. RUST_LOG=img2table=debug

SETUP:
  Requires the `tesseract` binary with the requested language data
  (e.g. apt install tesseract-ocr tesseract-ocr-kor).
"#;

/// Extract tables from images of spreadsheets.
#[derive(Parser, Debug)]
#[command(
    name = "img2table",
    version,
    about = "Extract tables from screenshots and photos of spreadsheets",
    long_about = "Extract tabular data from images (local files or URLs). The image is \
enhanced, recognised with Tesseract OCR, and split into rows and cells. Output can be \
JSON, Markdown, HTML, TSV or CSV.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present = "engine_info")]
    inputs: Vec<String>,

    /// Write output to this file (one input) or directory (several inputs).
    #[arg(short, long, env = "IMG2TABLE_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format. Default: inferred from --output, else json.
    #[arg(short, long, env = "IMG2TABLE_FORMAT", value_enum)]
    format: Option<FormatArg>,

    /// OCR languages, joined with '+' or ','.
    #[arg(short, long, env = "IMG2TABLE_LANG", default_value = "kor+eng")]
    lang: String,

    /// Page segmentation mode (0–13).
    #[arg(long, env = "IMG2TABLE_PSM", default_value_t = 6,
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: u8,

    /// How recognised lines are split into cells.
    #[arg(long, env = "IMG2TABLE_SPLIT", value_enum, default_value = "whitespace")]
    split: SplitArg,

    /// Skip grayscale/contrast/sharpness/blur enhancement.
    #[arg(long, env = "IMG2TABLE_NO_PREPROCESS")]
    no_preprocess: bool,

    /// Contrast factor (1.0 = unchanged).
    #[arg(long, env = "IMG2TABLE_CONTRAST", default_value_t = 2.0)]
    contrast: f32,

    /// Sharpness factor (1.0 = unchanged).
    #[arg(long, env = "IMG2TABLE_SHARPNESS", default_value_t = 2.0)]
    sharpness: f32,

    /// Gaussian blur radius applied after sharpening (0 = off).
    #[arg(long, env = "IMG2TABLE_BLUR", default_value_t = 0.5)]
    blur: f32,

    /// Let the engine collapse runs of spaces between words.
    #[arg(long, env = "IMG2TABLE_NO_INTERWORD_SPACES")]
    no_interword_spaces: bool,

    /// Tesseract executable.
    #[arg(long, env = "IMG2TABLE_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Directory containing *.traineddata files.
    #[arg(long, env = "IMG2TABLE_TESSDATA_DIR")]
    tessdata_dir: Option<PathBuf>,

    /// Resolution hint for the engine (70–2400).
    #[arg(long, env = "IMG2TABLE_DPI",
          value_parser = clap::value_parser!(u32).range(70..=2400))]
    dpi: Option<u32>,

    /// Number of images processed at once.
    #[arg(short, long, env = "IMG2TABLE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Give up after this many seconds; a running engine is killed.
    #[arg(long, env = "IMG2TABLE_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "IMG2TABLE_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Print the engine version and installed languages, then exit.
    #[arg(long)]
    engine_info: bool,

    /// Disable progress bar.
    #[arg(long, env = "IMG2TABLE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs and print failure traces.
    #[arg(short, long, env = "IMG2TABLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMG2TABLE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Json,
    Markdown,
    Html,
    Tsv,
    Csv,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Html => OutputFormat::Html,
            FormatArg::Tsv => OutputFormat::Tsv,
            FormatArg::Csv => OutputFormat::Csv,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SplitArg {
    Tab,
    Whitespace,
    WideGap,
}

impl From<SplitArg> for SplitPolicy {
    fn from(v: SplitArg) -> Self {
        match v {
            SplitArg::Tab => SplitPolicy::Tab,
            SplitArg::Whitespace => SplitPolicy::WhitespaceRun,
            SplitArg::WideGap => SplitPolicy::WideGap,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs during batch runs.
    let show_progress = show_progress_for(&cli);
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Engine info mode ─────────────────────────────────────────────────
    if cli.engine_info {
        return print_engine_info(config).await;
    }

    let format = cli
        .format
        .map(OutputFormat::from)
        .or_else(|| {
            cli.output
                .as_deref()
                .filter(|_| cli.inputs.len() == 1)
                .and_then(OutputFormat::from_path)
        })
        .unwrap_or_default();

    if cli.inputs.len() == 1 {
        run_single(&cli, &config, format).await
    } else {
        run_batch(&cli, &config, format).await
    }
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let languages: Vec<&str> = cli
        .lang
        .split(['+', ','])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut builder = ExtractionConfig::builder()
        .preprocessing(!cli.no_preprocess)
        .contrast(cli.contrast)
        .sharpness(cli.sharpness)
        .blur_radius(cli.blur)
        .languages(languages)
        .segmentation_mode(SegmentationMode::from_code(cli.psm)?)
        .preserve_interword_spacing(!cli.no_interword_spaces)
        .split_policy(cli.split.into())
        .tesseract_program(cli.tesseract.clone())
        .concurrency(cli.concurrency)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref dir) = cli.tessdata_dir {
        builder = builder.tessdata_dir(dir.clone());
    }
    if let Some(dpi) = cli.dpi {
        builder = builder.dpi(dpi);
    }
    // The outer timeout only stops waiting; this one kills the engine so a
    // stuck process cannot outlive the command.
    if let Some(secs) = cli.timeout {
        builder = builder.engine_timeout(Duration::from_secs(secs));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn print_engine_info(config: ExtractionConfig) -> Result<ExitCode> {
    let requested = config.recognition.languages.clone();
    let info = tokio::task::spawn_blocking(move || engine_info(&config))
        .await
        .context("Engine query task failed")?
        .context("Failed to query OCR engine")?;

    println!("Engine:     {}", info.version);
    println!("Languages:  {}", info.languages.join(", "));

    let missing = info.missing_languages(&requested);
    if missing.is_empty() {
        eprintln!("{} all requested languages installed", green("✔"));
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!(
            "{} missing language data: {}",
            red("✘"),
            bold(&missing.join(", "))
        );
        Ok(ExitCode::FAILURE)
    }
}

async fn run_single(cli: &Cli, config: &ExtractionConfig, format: OutputFormat) -> Result<ExitCode> {
    let input = &cli.inputs[0];
    let start = Instant::now();

    let result = match cli.output {
        Some(ref path) => {
            with_timeout(cli.timeout, extract_to_file(input, path, format, config))
                .await?
                .context("Extraction failed")?
        }
        None => {
            let result = with_timeout(cli.timeout, extract_file(input, config))
                .await?
                .context("Extraction failed")?;
            if let Some(rendered) = format.render(&result) {
                write_stdout(&rendered)?;
            }
            result
        }
    };

    match result {
        ExtractionResult::Success { table } => {
            if !cli.quiet {
                let dest = cli
                    .output
                    .as_ref()
                    .map(|p| format!("  →  {}", bold(&p.display().to_string())))
                    .unwrap_or_default();
                eprintln!(
                    "{}  {} rows  {}ms{}",
                    green("✔"),
                    table.row_count(),
                    start.elapsed().as_millis(),
                    dest
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        ExtractionResult::Failure(failure) => {
            report_failure(input, &failure, cli.verbose);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_batch(cli: &Cli, config: &ExtractionConfig, format: OutputFormat) -> Result<ExitCode> {
    if let Some(ref dir) = cli.output {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let results = with_timeout(cli.timeout, extract_many(&cli.inputs, config)).await?;
    let mut failed = 0usize;

    for (input, result) in cli.inputs.iter().zip(results) {
        let result = match result {
            Ok(r) => r,
            Err(e) => {
                failed += 1;
                eprintln!("{} {input}: {e}", red("✗"));
                continue;
            }
        };

        if let Some(rendered) = format.render(&result) {
            match cli.output {
                Some(ref dir) => {
                    let path = output_path_for(dir, input, format);
                    tokio::fs::write(&path, rendered)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                None => write_stdout(&format!("==> {input} <==\n{rendered}\n"))?,
            }
        }

        if let ExtractionResult::Failure(ref failure) = result {
            failed += 1;
            // The progress bar already printed the concise line.
            if !show_progress_for(cli) {
                report_failure(input, failure, cli.verbose);
            } else if cli.verbose {
                eprintln!("{}", dim(&failure.diagnostics.trace));
            }
        }
    }

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn show_progress_for(cli: &Cli) -> bool {
    !cli.quiet && !cli.no_progress && cli.inputs.len() > 1
}

async fn with_timeout<F: Future>(secs: Option<u64>, fut: F) -> Result<F::Output> {
    match secs {
        Some(s) => tokio::time::timeout(Duration::from_secs(s), fut)
            .await
            .with_context(|| format!("Timed out after {s}s")),
        None => Ok(fut.await),
    }
}

/// `<dir>/<input file stem>.<ext>`; URLs use their last path segment.
fn output_path_for(dir: &Path, input: &str, format: OutputFormat) -> PathBuf {
    let name = input
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(input);
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("table");
    dir.join(format!("{stem}.{}", format.extension()))
}

fn report_failure(input: &str, failure: &Failure, verbose: bool) {
    eprintln!("{} {input}: {failure}", red("✘"));
    if verbose && !failure.diagnostics.trace.is_empty() {
        eprintln!(
            "{}\n{}",
            dim(&format!("[{}]", failure.diagnostics.category)),
            dim(&failure.diagnostics.trace)
        );
    }
}

fn write_stdout(s: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(s.as_bytes())
        .context("Failed to write to stdout")?;
    if !s.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}
