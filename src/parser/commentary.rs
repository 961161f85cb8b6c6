use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use super::classify::STATE_NAMES;
use crate::source::DocumentKey;

static FURNITURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^NABCA Monthly Report|Control States Results$|^\d+$|^Page \d+").unwrap()
});
static NUMBER_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+,\d+.*\d+,\d+.*\d+,\d+").unwrap());
static COLUMN_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(9L|CMTY|R12TY|Shelf \$)").unwrap());
static NUMERIC_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9$%\s,\-\.]+$").unwrap());

/// Lines at or below this length are never narrative.
const MIN_LINE_CHARS: usize = 40;
/// Joined narrative must be longer than this to become a record.
const MIN_CONTENT_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentaryRecord {
    pub commentary_id: String,
    pub year: i32,
    pub month: u32,
    pub report_date: NaiveDate,
    pub section: String,
    pub content: String,
}

pub struct LineRule {
    pub name: &'static str,
    pub rejects: fn(&str) -> bool,
}

/// Rejection rules over a trimmed, non-empty line, evaluated in order.
pub const LINE_RULES: &[LineRule] = &[
    LineRule {
        name: "page_furniture",
        rejects: |l| FURNITURE_RE.is_match(l),
    },
    LineRule {
        name: "number_run",
        rejects: |l| NUMBER_RUN_RE.is_match(l),
    },
    LineRule {
        name: "column_label",
        rejects: |l| char_len(l) < 50 && COLUMN_LABEL_RE.is_match(l),
    },
    LineRule {
        name: "state_label",
        rejects: |l| char_len(l) < 40 && STATE_NAMES.iter().any(|s| l.contains(s)),
    },
    LineRule {
        name: "numeric_only",
        rejects: |l| NUMERIC_ONLY_RE.is_match(l),
    },
];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Name of the first rule rejecting `line`, if any.
pub fn rejected_by(line: &str) -> Option<&'static str> {
    LINE_RULES
        .iter()
        .find(|rule| (rule.rejects)(line))
        .map(|rule| rule.name)
}

/// Narrative prose of a document: surviving lines joined with single
/// spaces, in document order.
pub fn extract_commentary<'a>(lines: impl IntoIterator<Item = &'a str>) -> String {
    lines
        .into_iter()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| rejected_by(l).is_none())
        .filter(|l| char_len(l) > MIN_LINE_CHARS)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn build_commentary(key: &DocumentKey, content: String) -> Option<CommentaryRecord> {
    if char_len(&content) <= MIN_CONTENT_CHARS {
        return None;
    }
    Some(CommentaryRecord {
        commentary_id: format!("NABCA-{}-{:02}-001", key.year, key.month),
        year: key.year,
        month: key.month,
        report_date: key.report_date,
        section: "full_report".to_string(),
        content,
    })
}

// ── Tests ──
