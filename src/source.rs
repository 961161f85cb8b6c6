use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::blocks::Block;
use crate::error::SourceError;

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"20\d{2}").unwrap());

/// Tried in order against the uppercased name; the first hit wins.
const MONTHS: &[(&str, u32)] = &[
    ("JAN", 1),
    ("JANUARY", 1),
    ("FEB", 2),
    ("FEBRUARY", 2),
    ("MAR", 3),
    ("MARCH", 3),
    ("APR", 4),
    ("APRIL", 4),
    ("MAY", 5),
    ("JUN", 6),
    ("JUNE", 6),
    ("JUL", 7),
    ("JULY", 7),
    ("AUG", 8),
    ("AUGUST", 8),
    ("SEPT", 9),
    ("SEPTEMBER", 9),
    ("OCT", 10),
    ("OCTOBER", 10),
    ("NOV", 11),
    ("NOVEMBER", 11),
    ("DEC", 12),
    ("DECEMBER", 12),
];

const DUMP_EXTENSION: &str = "json";

/// Reporting month a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    pub year: i32,
    pub month: u32,
    pub report_date: NaiveDate,
}

impl DocumentKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        let report_date = NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(DocumentKey {
            year,
            month,
            report_date,
        })
    }

    /// `CSResults_DEC2025_rev.pdf` → 2025-12. Needs both a month token and
    /// a `20xx` year.
    pub fn from_filename(name: &str) -> Option<Self> {
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name)
            .replace("_rev", "");
        let upper = stem.to_uppercase();
        let month = MONTHS
            .iter()
            .find(|(token, _)| upper.contains(token))
            .map(|(_, m)| *m)?;
        let year = YEAR_RE.find(&stem)?.as_str().parse().ok()?;
        DocumentKey::new(year, month)
    }

    pub fn label(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }
}

/// Parse a `YYYY-MM` month argument.
pub fn parse_month_arg(arg: &str) -> Result<(i32, u32), String> {
    let (year, month) = arg
        .split_once('-')
        .ok_or_else(|| format!("invalid month '{}', use YYYY-MM (e.g. 2025-12)", arg))?;
    let year: i32 = year
        .parse()
        .map_err(|_| format!("invalid year in '{}'", arg))?;
    let month: u32 = month
        .parse()
        .map_err(|_| format!("invalid month in '{}'", arg))?;
    if !(1..=12).contains(&month) {
        return Err(format!("month out of range in '{}'", arg));
    }
    Ok((year, month))
}

#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub name: String,
    pub key: Option<DocumentKey>,
}

/// Analysis dumps in `dir`, sorted by name. With `targets`, only documents
/// whose month is listed are returned.
pub fn list_documents(
    dir: &Path,
    targets: Option<&HashSet<(i32, u32)>>,
) -> Result<Vec<SourceDocument>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read input directory {:?}", dir))?;

    let mut docs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(DUMP_EXTENSION) {
            continue;
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let key = DocumentKey::from_filename(&name);
        docs.push(SourceDocument { path, name, key });
    }
    docs.sort_by(|a, b| a.name.cmp(&b.name));

    let Some(targets) = targets else {
        return Ok(docs);
    };
    Ok(docs
        .into_iter()
        .filter(|d| match d.key {
            Some(k) => targets.contains(&(k.year, k.month)),
            None => {
                warn!("Skipping {}: could not parse year/month", d.name);
                false
            }
        })
        .collect())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AnalysisPage {
    #[serde(default)]
    job_status: Option<String>,
    #[serde(default)]
    next_token: Option<String>,
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnalysisDump {
    Pages(Vec<AnalysisPage>),
    Single(AnalysisPage),
}

/// Load a saved analysis result and assemble its pages into one block
/// collection. Only a fully paginated, successful job is accepted.
pub fn load_blocks(path: &Path) -> Result<Vec<Block>, SourceError> {
    let raw = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let dump: AnalysisDump = serde_json::from_str(&raw).map_err(|source| SourceError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let pages = match dump {
        AnalysisDump::Pages(pages) => pages,
        AnalysisDump::Single(page) => vec![page],
    };

    if let Some(status) = pages
        .iter()
        .filter_map(|p| p.job_status.as_deref())
        .find(|s| *s != "SUCCEEDED")
    {
        return Err(SourceError::JobNotSucceeded {
            path: path.to_path_buf(),
            status: status.to_string(),
        });
    }
    if pages.last().is_some_and(|p| p.next_token.is_some()) {
        return Err(SourceError::Truncated(path.to_path_buf()));
    }

    let page_count = pages.len();
    let blocks: Vec<Block> = pages.into_iter().flat_map(|p| p.blocks).collect();
    debug!("{:?}: {} pages, {} blocks", path, page_count, blocks.len());
    Ok(blocks)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> Option<(i32, u32)> {
        DocumentKey::from_filename(name).map(|k| (k.year, k.month))
    }

    #[test]
    fn filename_keys() {
        assert_eq!(key("CSResults_DEC2025_rev.pdf"), Some((2025, 12)));
        assert_eq!(key("CSResults_DEC2025.json"), Some((2025, 12)));
        assert_eq!(key("control-states-september-2024.pdf"), Some((2024, 9)));
        assert_eq!(key("CS_Sept_2023.json"), Some((2023, 9)));
        assert_eq!(key("nabca_jan2026.json"), Some((2026, 1)));
        assert_eq!(key("CSResults_2025.pdf"), None);
        assert_eq!(key("CSResults_DEC.pdf"), None);
        assert_eq!(key("CSResults_DEC1999.pdf"), None);
    }

    #[test]
    fn report_date_is_first_of_month() {
        let k = DocumentKey::from_filename("CSResults_MAR2025.pdf").unwrap();
        assert_eq!(k.report_date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(k.label(), "2025-03");
    }

    #[test]
    fn month_args() {
        assert_eq!(parse_month_arg("2025-12"), Ok((2025, 12)));
        assert_eq!(parse_month_arg("2025-3"), Ok((2025, 3)));
        assert!(parse_month_arg("2025").is_err());
        assert!(parse_month_arg("2025-13").is_err());
        assert!(parse_month_arg("dec-2025").is_err());
    }

    #[test]
    fn paginated_fixture() {
        let blocks = load_blocks(Path::new("tests/fixtures/CSResults_DEC2025_rev.json")).unwrap();
        assert_eq!(blocks.len(), 359);
        assert!(blocks.iter().any(|b| b.id == "t-0001"));
    }

    #[test]
    fn listing_filters_by_month() {
        let dir = Path::new("tests/fixtures");
        let all = list_documents(dir, None).unwrap();
        assert!(all.iter().any(|d| d.name == "CSResults_DEC2025_rev.json"));

        let wanted: HashSet<(i32, u32)> = [(2025, 12)].into_iter().collect();
        let matched = list_documents(dir, Some(&wanted)).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].key.map(|k| k.month), Some(12));

        let other: HashSet<(i32, u32)> = [(2024, 1)].into_iter().collect();
        assert!(list_documents(dir, Some(&other)).unwrap().is_empty());
    }

    fn write_temp(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("control_states_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn single_response_without_status() {
        let path = write_temp(
            "single.json",
            r#"{"Blocks":[{"BlockType":"LINE","Id":"l1","Text":"hello"}]}"#,
        );
        assert_eq!(load_blocks(&path).unwrap().len(), 1);
    }

    #[test]
    fn failed_job() {
        let path = write_temp("failed.json", r#"{"JobStatus":"FAILED","Blocks":[]}"#);
        assert!(matches!(
            load_blocks(&path),
            Err(SourceError::JobNotSucceeded { status, .. }) if status == "FAILED"
        ));
    }

    #[test]
    fn dangling_next_token() {
        let path = write_temp(
            "truncated.json",
            r#"[{"JobStatus":"SUCCEEDED","NextToken":"abc","Blocks":[]}]"#,
        );
        assert!(matches!(load_blocks(&path), Err(SourceError::Truncated(_))));
    }

    #[test]
    fn malformed_json() {
        let path = write_temp("broken.json", "{not json");
        assert!(matches!(load_blocks(&path), Err(SourceError::Json { .. })));
    }
}
