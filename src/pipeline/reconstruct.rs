//! Table reconstruction: raw engine text → rows of cells.
//!
//! The engine knows nothing about tables; it emits lines of text whose
//! column gaps survive as tabs or runs of spaces. Reconstruction is a pure
//! line-by-line heuristic:
//!
//! ```text
//! raw text ──▶ lines ──▶ drop blank lines ──▶ split cells (SplitPolicy) ──▶ Table
//! ```
//!
//! Row order follows line order and cell order follows token order. Rows are
//! never padded or truncated; ragged output is passed through as-is.

use crate::config::SplitPolicy;
use crate::output::Table;
use once_cell::sync::Lazy;
use regex::Regex;

/// Turns raw recognised text into a [`Table`].
///
/// Reconstruction cannot fail: text with no usable lines is an empty table.
pub trait TableReconstructor: Send + Sync {
    fn reconstruct(&self, raw: &str) -> Table;
}

/// The default reconstructor: one row per non-blank line, cells split
/// according to a [`SplitPolicy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineSplitter {
    policy: SplitPolicy,
}

impl LineSplitter {
    pub fn new(policy: SplitPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SplitPolicy {
        self.policy
    }
}

impl TableReconstructor for LineSplitter {
    fn reconstruct(&self, raw: &str) -> Table {
        reconstruct(raw, self.policy)
    }
}

/// Reconstruct `raw` with the given policy.
pub fn reconstruct(raw: &str, policy: SplitPolicy) -> Table {
    let rows = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| split_cells(line, policy))
        .collect();
    Table::new(rows)
}

fn split_cells(line: &str, policy: SplitPolicy) -> Vec<String> {
    match policy {
        SplitPolicy::Tab => split_tabs(line),
        SplitPolicy::WhitespaceRun => split_whitespace_runs(line),
        SplitPolicy::WideGap => split_wide_gaps(line),
    }
}

// ── Tab ──────────────────────────────────────────────────────────────────

/// Strictly on `\t`. Consecutive tabs yield empty cells; cells keep their
/// surrounding spaces.
fn split_tabs(line: &str) -> Vec<String> {
    line.split('\t').map(str::to_string).collect()
}

// ── Whitespace run ───────────────────────────────────────────────────────

fn split_whitespace_runs(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

// ── Wide gap ─────────────────────────────────────────────────────────────

/// Two or more whitespace characters, or any tab. Longest run first so a
/// run containing tabs is consumed as a single delimiter.
static RE_WIDE_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}|\t").unwrap());

fn split_wide_gaps(line: &str) -> Vec<String> {
    RE_WIDE_GAP
        .split(line.trim())
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(t: &Table) -> Vec<Vec<&str>> {
        t.rows()
            .iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn tab_delimited_table() {
        let t = reconstruct("Name\tAge\nAlice\t30\nBob\t25", SplitPolicy::Tab);
        assert_eq!(
            rows(&t),
            vec![vec!["Name", "Age"], vec!["Alice", "30"], vec!["Bob", "25"]]
        );
    }

    #[test]
    fn whitespace_runs_drop_blank_lines() {
        let t = reconstruct("Name   Age\n\nAlice   30", SplitPolicy::WhitespaceRun);
        assert_eq!(rows(&t), vec![vec!["Name", "Age"], vec!["Alice", "30"]]);
    }

    #[test]
    fn empty_text_is_empty_table() {
        for policy in [SplitPolicy::Tab, SplitPolicy::WhitespaceRun, SplitPolicy::WideGap] {
            assert!(reconstruct("", policy).is_empty());
        }
    }

    #[test]
    fn form_feed_and_crlf_are_ignored() {
        let t = reconstruct("a b\r\nc d\r\n\x0c", SplitPolicy::WhitespaceRun);
        assert_eq!(rows(&t), vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn row_count_equals_non_blank_line_count() {
        let raw = "one\n  \ntwo three\n\t\nfour\n\n";
        let t = reconstruct(raw, SplitPolicy::WhitespaceRun);
        assert_eq!(t.row_count(), 3);
        assert_eq!(rows(&t)[1], vec!["two", "three"]);
    }

    #[test]
    fn blank_lines_never_change_the_table() {
        let base = "Name  Age\nAlice  30\nBob  25";
        let padded = "\n   \nName  Age\n\n\t\nAlice  30\n \nBob  25\n\n";
        for policy in [SplitPolicy::Tab, SplitPolicy::WhitespaceRun, SplitPolicy::WideGap] {
            assert_eq!(reconstruct(base, policy), reconstruct(padded, policy));
        }
    }

    #[test]
    fn collapsing_delimiters_never_adds_cells() {
        let raw = "a    b \t c\nd  \t  e";
        let collapsed = "a b c\nd e";
        let t1 = reconstruct(raw, SplitPolicy::WhitespaceRun);
        let t2 = reconstruct(collapsed, SplitPolicy::WhitespaceRun);
        assert_eq!(t1, t2);
    }

    #[test]
    fn single_token_line_is_single_cell_row() {
        let t = reconstruct("Total", SplitPolicy::WhitespaceRun);
        assert_eq!(rows(&t), vec![vec!["Total"]]);
    }

    #[test]
    fn ragged_rows_pass_through() {
        let t = reconstruct("a b c\nd\ne f", SplitPolicy::WhitespaceRun);
        assert_eq!(
            t.rows().iter().map(Vec::len).collect::<Vec<_>>(),
            vec![3, 1, 2]
        );
    }

    #[test]
    fn tab_policy_keeps_spaces_and_empty_cells() {
        let t = reconstruct("Alice Smith\t\t30 ", SplitPolicy::Tab);
        assert_eq!(rows(&t), vec![vec!["Alice Smith", "", "30 "]]);
    }

    #[test]
    fn wide_gap_keeps_single_spaced_words_together() {
        let t = reconstruct(
            "  Full Name    Home City\nAlice Smith   New York\nBob\tParis",
            SplitPolicy::WideGap,
        );
        assert_eq!(
            rows(&t),
            vec![
                vec!["Full Name", "Home City"],
                vec!["Alice Smith", "New York"],
                vec!["Bob", "Paris"]
            ]
        );
    }

    #[test]
    fn wide_gap_treats_mixed_runs_as_one_delimiter() {
        let t = reconstruct("a \t\tb\t c", SplitPolicy::WideGap);
        assert_eq!(rows(&t), vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn non_ascii_cells() {
        let t = reconstruct("이름   나이\n김철수   30", SplitPolicy::WhitespaceRun);
        assert_eq!(rows(&t), vec![vec!["이름", "나이"], vec!["김철수", "30"]]);
    }

    #[test]
    fn line_splitter_uses_its_policy() {
        let splitter = LineSplitter::new(SplitPolicy::Tab);
        assert_eq!(splitter.policy(), SplitPolicy::Tab);
        let t = splitter.reconstruct("a b\tc");
        assert_eq!(rows(&t), vec![vec!["a b", "c"]]);
    }
}
