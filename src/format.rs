//! Rendering of extraction results for files and stdout.
//!
//! | Format | Success | Failure |
//! |--------|---------|---------|
//! | `json` | `{"tableData": …}` | `{"error": …, "details": …}` |
//! | `markdown` | GFM table, first row as header | not rendered |
//! | `html` | `<table>`, first row in `<thead>`, escaped cells | not rendered |
//! | `tsv` / `csv` | one record per row, quoted where needed | not rendered |
//!
//! Only `json` can represent a failure; the other formats render tables and
//! return `None` for a failed result.

use crate::output::{ExtractionResult, Table};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Output format for rendered results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Response-shaped JSON (default).
    #[default]
    Json,
    Markdown,
    Html,
    Tsv,
    Csv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Csv => "csv",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(OutputFormat::Json),
            "md" | "markdown" => Some(OutputFormat::Markdown),
            "html" | "htm" => Some(OutputFormat::Html),
            "tsv" | "tab" => Some(OutputFormat::Tsv),
            "csv" => Some(OutputFormat::Csv),
            _ => None,
        }
    }

    /// Render a result. `None` when the format cannot represent a failure.
    pub fn render(self, result: &ExtractionResult) -> Option<String> {
        match (self, result) {
            (OutputFormat::Json, r) => Some(render_json(r)),
            (_, ExtractionResult::Success { table }) => Some(self.render_table(table)),
            (_, ExtractionResult::Failure(_)) => None,
        }
    }

    pub fn render_table(self, table: &Table) -> String {
        match self {
            OutputFormat::Json => {
                render_json(&ExtractionResult::Success {
                    table: table.clone(),
                })
            }
            OutputFormat::Markdown => render_markdown(table),
            OutputFormat::Html => render_html(table),
            OutputFormat::Tsv => render_delimited(table, b'\t'),
            OutputFormat::Csv => render_delimited(table, b','),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Html => "html",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Csv => "csv",
        };
        f.write_str(s)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            "tsv" => Ok(OutputFormat::Tsv),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!(
                "unknown format '{other}' (expected json, markdown, html, tsv or csv)"
            )),
        }
    }
}

// ── JSON ─────────────────────────────────────────────────────────────────

fn render_json(result: &ExtractionResult) -> String {
    let value = result.to_response_json();
    // A `serde_json::Value` always serialises.
    let mut s = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
    s.push('\n');
    s
}

// ── Markdown ─────────────────────────────────────────────────────────────

/// Ragged rows are padded with empty cells here only: GFM needs every row to
/// have the header's width.
fn render_markdown(table: &Table) -> String {
    let width = table.max_columns();
    if width == 0 {
        return String::new();
    }

    let row_line = |row: &[String]| {
        let mut line = String::from("|");
        for i in 0..width {
            let cell = row.get(i).map(String::as_str).unwrap_or("");
            line.push(' ');
            line.push_str(&escape_markdown(cell));
            line.push_str(" |");
        }
        line.push('\n');
        line
    };

    let mut out = String::new();
    let mut rows = table.rows().iter();
    if let Some(header) = rows.next() {
        out.push_str(&row_line(header));
        out.push('|');
        out.push_str(&" --- |".repeat(width));
        out.push('\n');
    }
    for row in rows {
        out.push_str(&row_line(row));
    }
    out
}

fn escape_markdown(cell: &str) -> String {
    cell.trim().replace('\\', "\\\\").replace('|', "\\|")
}

// ── HTML ─────────────────────────────────────────────────────────────────

/// The first row is the header, the same convention as Markdown.
fn render_html(table: &Table) -> String {
    let mut out = String::from("<table>\n");
    let mut rows = table.rows().iter();
    if let Some(header) = rows.next() {
        out.push_str("  <thead>\n");
        push_html_row(&mut out, header, "th");
        out.push_str("  </thead>\n  <tbody>\n");
        for row in rows {
            push_html_row(&mut out, row, "td");
        }
        out.push_str("  </tbody>\n");
    }
    out.push_str("</table>\n");
    out
}

fn push_html_row(out: &mut String, row: &[String], tag: &str) {
    out.push_str("    <tr>");
    for cell in row {
        out.push_str(&format!("<{tag}>{}</{tag}>", escape_html(cell)));
    }
    out.push_str("</tr>\n");
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ── TSV / CSV ────────────────────────────────────────────────────────────

/// Ragged rows are written as they are; no padding.
fn render_delimited(table: &Table, delimiter: u8) -> String {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());

    // Writes go to memory; a failure here would be a bug in the writer.
    for row in table.rows() {
        if let Err(e) = writer.write_record(row) {
            warn!("Failed to write delimited row: {e}");
        }
    }
    if let Err(e) = writer.flush() {
        warn!("Failed to flush delimited output: {e}");
    }
    String::from_utf8_lossy(writer.get_ref()).into_owned()
}
