//! OCR adapter: run the recognition engine on a preprocessed image.
//!
//! The pipeline only ever talks to [`OcrEngine`], a typed
//! `recognize(image, config) -> text | error` interface. [`TesseractEngine`]
//! is the default implementation; library users can plug in any other
//! binding through [`crate::config::ExtractionConfig::engine`].
//!
//! ## Error mapping
//!
//! The engine reports problems as free-form text on stderr. This module is
//! the only place that reads that text; it maps it onto the failure taxonomy
//! so nothing downstream depends on a particular engine's wording:
//!
//! | Situation | Result |
//! |-----------|--------|
//! | binary missing / cannot be spawned / pipe failure | `EngineUnavailable` |
//! | non-zero exit, killed by signal, error lines on stderr | `RecognitionError` |
//! | run exceeds [`TesseractSettings::timeout`] (process is killed) | `RecognitionError` |
//! | stdout is not UTF-8 | `MalformedOutput` |
//! | only known-benign notices on stderr | success |

use crate::config::{RecognitionConfig, TesseractSettings};
use crate::error::StageError;
use crate::pipeline::encode::encode_png;
use crate::pipeline::preprocess::PreprocessedImage;
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use std::ffi::OsString;
use std::io::{ErrorKind, Read, Write};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A recognition capability the pipeline can call.
///
/// Implementations block until recognition finishes and return the engine's
/// raw text, untouched. They must not panic on engine failure; every failure
/// is reported as a [`StageError`].
pub trait OcrEngine: Send + Sync {
    /// Short engine name used in logs.
    fn name(&self) -> &str {
        "ocr"
    }

    fn recognize(
        &self,
        image: &PreprocessedImage,
        config: &RecognitionConfig,
    ) -> Result<String, StageError>;
}

/// Adapter over the `tesseract` command-line engine.
///
/// The image is streamed to the engine as PNG on stdin and the text is read
/// back from stdout, so no temporary files or generated scripts are involved.
#[derive(Debug, Clone, Default)]
pub struct TesseractEngine {
    settings: TesseractSettings,
}

impl TesseractEngine {
    pub fn new(settings: TesseractSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TesseractSettings {
        &self.settings
    }

    /// Command-line arguments for one recognition call.
    pub fn recognition_args(&self, config: &RecognitionConfig) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(12);
        if let Some(ref dir) = self.settings.tessdata_dir {
            args.push("--tessdata-dir".into());
            args.push(dir.clone().into_os_string());
        }
        args.push("stdin".into());
        args.push("stdout".into());
        args.push("-l".into());
        args.push(config.language_spec().into());
        args.push("--psm".into());
        args.push(config.segmentation_mode.code().to_string().into());
        if let Some(dpi) = self.settings.dpi {
            args.push("--dpi".into());
            args.push(dpi.to_string().into());
        }
        args.push("-c".into());
        args.push(
            format!(
                "preserve_interword_spaces={}",
                u8::from(config.preserve_interword_spacing)
            )
            .into(),
        );
        args
    }

    /// Engine version line, e.g. `tesseract 5.3.0`.
    pub fn version(&self) -> Result<String, StageError> {
        let output = self.run(&["--version".into()], None)?;
        // Older releases print the version on stderr.
        let text = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        text.lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| StageError::MalformedOutput {
                category: "EmptyVersion".to_string(),
                message: "Engine printed no version information".to_string(),
                trace: String::new(),
            })
    }

    /// Languages the engine has trained data for.
    pub fn list_languages(&self) -> Result<Vec<String>, StageError> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(ref dir) = self.settings.tessdata_dir {
            args.push("--tessdata-dir".into());
            args.push(dir.clone().into_os_string());
        }
        args.push("--list-langs".into());
        let output = self.run(&args, None)?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = interpret_output(output.status.code(), output.stdout, &stderr)?;
        Ok(parse_language_list(&stdout))
    }

    /// Spawn the engine, optionally feeding `stdin`, and collect its output.
    fn run(&self, args: &[OsString], stdin: Option<Vec<u8>>) -> Result<Output, StageError> {
        let program = &self.settings.program;
        debug!("Running {} {:?}", program.display(), args);

        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&program.display().to_string(), e))?;

        // Feed stdin and drain both pipes on separate threads: the engine may
        // fill its stdout pipe before it has consumed all input.
        let writer = match (stdin, child.stdin.take()) {
            (Some(bytes), Some(mut pipe)) => Some(std::thread::spawn(move || pipe.write_all(&bytes))),
            _ => None,
        };
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let status = match self.settings.timeout {
            Some(limit) => wait_with_deadline(&mut child, limit)?,
            None => child.wait().map_err(|e| wait_error(program, e))?,
        };
        let output = Output {
            status,
            stdout: collect(stdout_reader)?,
            stderr: collect(stderr_reader)?,
        };

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                // The engine stopped reading early; its own exit status says why.
                Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe && !output.status.success() => {
                    debug!("Engine closed stdin early: {e}");
                }
                Ok(Err(e)) => {
                    return Err(StageError::EngineUnavailable {
                        category: "EngineIo".to_string(),
                        message: format!("Failed to send image to {}: {e}", program.display()),
                        trace: format!("{e:?}"),
                    })
                }
                Err(_) => {
                    return Err(StageError::EngineUnavailable {
                        category: "EngineIo".to_string(),
                        message: "Image writer thread panicked".to_string(),
                        trace: String::new(),
                    })
                }
            }
        }

        Ok(output)
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(
        &self,
        image: &PreprocessedImage,
        config: &RecognitionConfig,
    ) -> Result<String, StageError> {
        let start = Instant::now();
        let png = encode_png(image)?;
        let args = self.recognition_args(config);

        let output = self.run(&args, Some(png))?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        let result = interpret_output(output.status.code(), output.stdout, &stderr);

        match &result {
            Ok(text) => info!(
                "tesseract recognised {} chars ({} lines) in {}ms",
                text.len(),
                text.lines().count(),
                start.elapsed().as_millis()
            ),
            Err(e) => warn!("tesseract failed after {}ms: {}", start.elapsed().as_millis(), e),
        }
        result
    }
}

// ── Process plumbing ─────────────────────────────────────────────────

const POLL_INTERVAL: Duration = Duration::from_millis(20);

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<std::io::Result<Vec<u8>>>> {
    pipe.map(|mut p| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            p.read_to_end(&mut buf).map(|_| buf)
        })
    })
}

fn collect(reader: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<Vec<u8>, StageError> {
    let Some(handle) = reader else {
        return Ok(Vec::new());
    };
    match handle.join() {
        Ok(Ok(buf)) => Ok(buf),
        Ok(Err(e)) => Err(StageError::EngineUnavailable {
            category: "EngineIo".to_string(),
            message: format!("Failed to read engine output: {e}"),
            trace: format!("{e:?}"),
        }),
        Err(_) => Err(StageError::EngineUnavailable {
            category: "EngineIo".to_string(),
            message: "Output reader thread panicked".to_string(),
            trace: String::new(),
        }),
    }
}

/// Wait for the engine, killing it once `limit` has passed.
///
/// On timeout the pipe threads are left to finish on their own: a process
/// the engine forked may still hold the pipes open.
fn wait_with_deadline(child: &mut Child, limit: Duration) -> Result<ExitStatus, StageError> {
    let deadline = Instant::now() + limit;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                if let Err(e) = child.kill() {
                    warn!("Failed to kill engine process {}: {e}", child.id());
                }
                // Reap it so no zombie is left behind.
                let _ = child.wait();
                return Err(StageError::Recognition {
                    category: "EngineTimeout".to_string(),
                    message: format!(
                        "Engine did not finish within {}ms and was killed",
                        limit.as_millis()
                    ),
                    trace: String::new(),
                });
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                return Err(StageError::EngineUnavailable {
                    category: "EngineIo".to_string(),
                    message: format!("Failed to wait for engine process {}: {e}", child.id()),
                    trace: format!("{e:?}"),
                })
            }
        }
    }
}

fn wait_error(program: &std::path::Path, e: std::io::Error) -> StageError {
    StageError::EngineUnavailable {
        category: "EngineIo".to_string(),
        message: format!("Failed to wait for {}: {e}", program.display()),
        trace: format!("{e:?}"),
    }
}

// ── Diagnostics ──────────────────────────────────────────────────────────

/// Notices the engine prints on stderr during normal, successful runs.
static BENIGN_NOTICES: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"^Estimating resolution as \d+",
        r"(?i)^warning\b",
        r"^Detected \d+ diacritics",
        r"^Empty page!*",
        r"^Tesseract Open Source OCR Engine",
        r"^Page \d+",
        r"^Too few characters\. Skipping this page",
        r"^OSD: ",
    ])
    .expect("benign notice patterns are valid")
});

static LANGUAGE_DATA_MISSING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)failed loading language|error opening data file|could not initiali[sz]e tesseract|tessdata_prefix",
    )
    .expect("language pattern is valid")
});

static IMAGE_READ_ERROR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)pixreadmem|error in pix|cannot be read|unsupported image type|read_params_file")
        .expect("image pattern is valid")
});

static ENGINE_CRASH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)segmentation fault|core dumped|aborted|assert(ion)? failed")
        .expect("crash pattern is valid")
});

/// Stderr lines that indicate a problem (blank lines and benign notices removed).
fn significant_lines(stderr: &str) -> Vec<&str> {
    stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| {
            let benign = BENIGN_NOTICES.is_match(l);
            if benign {
                debug!("tesseract: {l}");
            }
            !benign
        })
        .collect()
}

fn categorise(exit_code: Option<i32>, stderr: &str) -> &'static str {
    if LANGUAGE_DATA_MISSING.is_match(stderr) {
        "LanguageDataMissing"
    } else if IMAGE_READ_ERROR.is_match(stderr) {
        "ImageReadError"
    } else if exit_code.is_none() || ENGINE_CRASH.is_match(stderr) {
        "EngineCrash"
    } else {
        "EngineError"
    }
}

/// Turn a finished engine run into text or a classified failure.
///
/// `exit_code` is `None` when the process was terminated by a signal.
pub(crate) fn interpret_output(
    exit_code: Option<i32>,
    stdout: Vec<u8>,
    stderr: &str,
) -> Result<String, StageError> {
    let problems = significant_lines(stderr);

    if exit_code != Some(0) || !problems.is_empty() {
        let message = match (problems.first(), exit_code) {
            (Some(line), _) => line.to_string(),
            (None, Some(code)) => format!("Engine exited with status {code}"),
            (None, None) => "Engine was terminated by a signal".to_string(),
        };
        return Err(StageError::Recognition {
            category: categorise(exit_code, stderr).to_string(),
            message,
            trace: stderr.to_string(),
        });
    }

    String::from_utf8(stdout).map_err(|e| StageError::MalformedOutput {
        category: "InvalidUtf8".to_string(),
        message: format!("Engine output is not valid UTF-8: {e}"),
        trace: format!("{e:?}"),
    })
}

fn spawn_error(program: &str, e: std::io::Error) -> StageError {
    let (category, message) = match e.kind() {
        ErrorKind::NotFound => (
            "EngineNotFound",
            format!("OCR engine '{program}' not found. Install tesseract or set --tesseract."),
        ),
        _ => (
            "EngineSpawnFailed",
            format!("Failed to start OCR engine '{program}': {e}"),
        ),
    };
    StageError::EngineUnavailable {
        category: category.to_string(),
        message,
        trace: format!("{e:?}"),
    }
}

fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of available languages"))
        .map(str::to_string)
        .collect()
}
