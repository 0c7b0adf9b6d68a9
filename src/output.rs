//! Result types handed back to the caller.
//!
//! [`ExtractionResult`] is the only value that crosses the pipeline boundary.
//! It is a tagged union: either a [`Table`] or a [`Failure`] carrying the
//! failure kind, a concise message and the low-level [`Diagnostics`].

use crate::error::StageError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Ordered rows of ordered cell strings.
///
/// Rows may be ragged: the reconstructor never pads or truncates, so column
/// alignment across rows is left to the consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell count of the widest row (0 for an empty table).
    pub fn max_columns(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// True when every row has the same number of cells.
    pub fn is_rectangular(&self) -> bool {
        match self.rows.first() {
            Some(first) => self.rows.iter().all(|r| r.len() == first.len()),
            None => true,
        }
    }
}

impl From<Vec<Vec<String>>> for Table {
    fn from(rows: Vec<Vec<String>>) -> Self {
        Self::new(rows)
    }
}

/// The failure taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Unreadable or corrupt input image.
    InvalidImage,
    /// The recognition engine could not be invoked.
    EngineUnavailable,
    /// The engine ran but reported a failure.
    RecognitionError,
    /// The engine succeeded but its output could not be read as text.
    MalformedOutput,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::InvalidImage => "InvalidImage",
            FailureKind::EngineUnavailable => "EngineUnavailable",
            FailureKind::RecognitionError => "RecognitionError",
            FailureKind::MalformedOutput => "MalformedOutput",
        };
        f.write_str(s)
    }
}

/// Low-level detail kept apart from the user-facing message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Error category / type name, e.g. `LanguageDataMissing`.
    pub category: String,
    /// Full diagnostic trace (engine stderr, decoder debug output).
    pub trace: String,
}

/// A failed extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    pub diagnostics: Diagnostics,
}

impl From<StageError> for Failure {
    fn from(err: StageError) -> Self {
        let kind = err.kind();
        let (category, message, trace) = match err {
            StageError::InvalidImage {
                category,
                message,
                trace,
            }
            | StageError::EngineUnavailable {
                category,
                message,
                trace,
            }
            | StageError::Recognition {
                category,
                message,
                trace,
            }
            | StageError::MalformedOutput {
                category,
                message,
                trace,
            } => (category, message, trace),
        };
        Failure {
            kind,
            message,
            diagnostics: Diagnostics { category, trace },
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of one extraction call. Exactly one variant is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionResult {
    Success { table: Table },
    Failure(Failure),
}

/// Top-level error string used in the response shape for failures.
pub const RESPONSE_ERROR: &str = "Image processing failed";

impl ExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionResult::Success { .. })
    }

    pub fn table(&self) -> Option<&Table> {
        match self {
            ExtractionResult::Success { table } => Some(table),
            ExtractionResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            ExtractionResult::Success { .. } => None,
            ExtractionResult::Failure(f) => Some(f),
        }
    }

    /// Convert into a plain `Result`, for callers that prefer `?`.
    pub fn into_result(self) -> Result<Table, Failure> {
        match self {
            ExtractionResult::Success { table } => Ok(table),
            ExtractionResult::Failure(f) => Err(f),
        }
    }

    /// Response body in the shape the web front-end consumes:
    ///
    /// ```json
    /// { "tableData": [["Name", "Age"], ["Alice", "30"]] }
    /// { "error": "Image processing failed",
    ///   "details": { "kind": "...", "type": "...", "message": "...", "traceback": "..." } }
    /// ```
    pub fn to_response_json(&self) -> Value {
        match self {
            ExtractionResult::Success { table } => json!({ "tableData": table.rows() }),
            ExtractionResult::Failure(f) => json!({
                "error": RESPONSE_ERROR,
                "details": {
                    "kind": f.kind.to_string(),
                    "type": f.diagnostics.category,
                    "message": f.message,
                    "traceback": f.diagnostics.trace,
                }
            }),
        }
    }
}

/// What the installed OCR engine reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    pub version: String,
    pub languages: Vec<String>,
}

impl EngineInfo {
    /// Requested languages the engine has no trained data for.
    pub fn missing_languages<'a>(&self, requested: &'a [String]) -> Vec<&'a str> {
        requested
            .iter()
            .filter(|l| !self.languages.contains(l))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_languages_are_reported_in_request_order() {
        let info = EngineInfo {
            version: "tesseract 5.3.0".into(),
            languages: vec!["eng".into(), "osd".into()],
        };
        let requested = vec!["kor".to_string(), "eng".to_string(), "jpn".to_string()];
        assert_eq!(info.missing_languages(&requested), vec!["kor", "jpn"]);
    }

    fn table(rows: &[&[&str]]) -> Table {
        Table::new(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn table_shape_helpers() {
        let t = table(&[&["a", "b", "c"], &["d"]]);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.max_columns(), 3);
        assert!(!t.is_rectangular());
        assert!(Table::default().is_rectangular());
        assert_eq!(Table::default().max_columns(), 0);
    }

    #[test]
    fn failure_from_stage_error_keeps_everything() {
        let err = StageError::EngineUnavailable {
            category: "EngineNotFound".into(),
            message: "tesseract not found".into(),
            trace: "No such file or directory (os error 2)".into(),
        };
        let f = Failure::from(err);
        assert_eq!(f.kind, FailureKind::EngineUnavailable);
        assert_eq!(f.message, "tesseract not found");
        assert_eq!(f.diagnostics.category, "EngineNotFound");
        assert_eq!(f.diagnostics.trace, "No such file or directory (os error 2)");
        assert_eq!(f.to_string(), "EngineUnavailable: tesseract not found");
    }

    #[test]
    fn success_response_has_table_data() {
        let r = ExtractionResult::Success {
            table: table(&[&["Name", "Age"], &["Alice", "30"]]),
        };
        let v = r.to_response_json();
        assert_eq!(v["tableData"][1][0], "Alice");
        assert!(v.get("error").is_none());
    }

    #[test]
    fn failure_response_has_details() {
        let r = ExtractionResult::Failure(Failure {
            kind: FailureKind::RecognitionError,
            message: "boom".into(),
            diagnostics: Diagnostics {
                category: "EngineError".into(),
                trace: "trace".into(),
            },
        });
        let v = r.to_response_json();
        assert_eq!(v["error"], RESPONSE_ERROR);
        assert_eq!(v["details"]["kind"], "RecognitionError");
        assert_eq!(v["details"]["type"], "EngineError");
        assert_eq!(v["details"]["traceback"], "trace");
        assert!(v.get("tableData").is_none());
    }

    #[test]
    fn tagged_serialisation() {
        let r = ExtractionResult::Success {
            table: table(&[&["x"]]),
        };
        let s = serde_json::to_string(&r).unwrap();
        assert_eq!(s, r#"{"status":"success","table":[["x"]]}"#);
    }
}
