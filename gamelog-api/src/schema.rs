//! Schema resolution
//!
//! Maps hand-maintained spreadsheet headers onto canonical fields. Headers
//! and candidate spellings are both normalized (lowercase, every run of
//! non-alphanumeric characters collapsed to `_`, edges trimmed) before they
//! are compared, so "NAME OF THE GAME", "name_of_the_game" and
//! "Name-Of-The-Game" all match the same candidate.
//!
//! Cell coercion is permissive: anything that does not parse as the field's
//! type becomes empty rather than failing the read.

use crate::models::{CanonicalRow, UNKNOWN_TITLE};
use crate::sheet::{from_excel_serial, CellValue, SheetTable};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use gamelog_common::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, warn};

/// Canonical semantic columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    Title,
    Platform,
    CompletedOn,
    Hours,
    Rating,
    Developer,
    Metascore,
    MetascorePlatform,
    MetacriticUrl,
    MetacriticCount,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::Title,
        CanonicalField::Platform,
        CanonicalField::CompletedOn,
        CanonicalField::Hours,
        CanonicalField::Rating,
        CanonicalField::Developer,
        CanonicalField::Metascore,
        CanonicalField::MetascorePlatform,
        CanonicalField::MetacriticUrl,
        CanonicalField::MetacriticCount,
    ];

    /// Configuration name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Title => "title",
            CanonicalField::Platform => "platform",
            CanonicalField::CompletedOn => "completed_on",
            CanonicalField::Hours => "hours",
            CanonicalField::Rating => "rating",
            CanonicalField::Developer => "developer",
            CanonicalField::Metascore => "metascore",
            CanonicalField::MetascorePlatform => "metascore_platform",
            CanonicalField::MetacriticUrl => "metacritic_url",
            CanonicalField::MetacriticCount => "metacritic_count",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let normalized = normalize_header(name);
        Self::ALL.into_iter().find(|f| f.as_str() == normalized)
    }

    fn default_candidates(&self) -> &'static [&'static str] {
        match self {
            CanonicalField::Title => &["name_of_the_game", "title", "name", "game", "game_title"],
            CanonicalField::Platform => &["platform", "console", "system"],
            CanonicalField::CompletedOn => {
                &["completed_on", "completed", "date_completed", "finished", "beaten_on"]
            }
            CanonicalField::Hours => &["hours", "playtime", "time_spent"],
            CanonicalField::Rating => &["category", "rating", "tier", "my_rating"],
            CanonicalField::Developer => &["developer", "dev", "studio"],
            CanonicalField::Metascore => &["metascore", "meta_score", "meta"],
            CanonicalField::MetascorePlatform => &["metascore_platform", "platform_metascore"],
            CanonicalField::MetacriticUrl => &["metacritic_url", "meta_url"],
            CanonicalField::MetacriticCount => {
                &["metacritic_count", "ratings_count", "rating_count"]
            }
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a header or candidate spelling for comparison
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_separator = false;
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    out
}

// ============================================================================
// Candidate table
// ============================================================================

/// Ordered candidate header spellings per canonical field
///
/// Within a field, earlier candidates win. Each normalized spelling may
/// appear only once across the whole table.
#[derive(Debug, Clone)]
pub struct ColumnCandidateTable {
    entries: Vec<(CanonicalField, Vec<String>)>,
}

impl Default for ColumnCandidateTable {
    fn default() -> Self {
        let entries = CanonicalField::ALL
            .iter()
            .map(|field| {
                let candidates = field
                    .default_candidates()
                    .iter()
                    .map(|c| c.to_string())
                    .collect();
                (*field, candidates)
            })
            .collect();
        Self { entries }
    }
}

impl ColumnCandidateTable {
    /// Build a table from explicit entries and validate it
    pub fn new(entries: Vec<(CanonicalField, Vec<String>)>) -> Result<Self> {
        let table = Self {
            entries: entries
                .into_iter()
                .map(|(field, candidates)| {
                    (field, candidates.iter().map(|c| normalize_header(c)).collect())
                })
                .collect(),
        };
        table.validate()?;
        Ok(table)
    }

    /// Defaults with per-field replacements from configuration
    ///
    /// Override keys are canonical field names (`title`, `completed_on`, ...).
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut table = Self::default();
        for (name, candidates) in overrides {
            let field = CanonicalField::parse(name).ok_or_else(|| {
                Error::Config(format!("Unknown canonical field in [columns]: '{}'", name))
            })?;
            let normalized: Vec<String> = candidates.iter().map(|c| normalize_header(c)).collect();
            if let Some(entry) = table.entries.iter_mut().find(|(f, _)| *f == field) {
                entry.1 = normalized;
            }
        }
        table.validate()?;
        Ok(table)
    }

    /// Reject empty, duplicate, or ambiguous candidate spellings
    pub fn validate(&self) -> Result<()> {
        let mut owners: HashMap<&str, CanonicalField> = HashMap::new();
        for (field, candidates) in &self.entries {
            if candidates.is_empty() {
                return Err(Error::Config(format!("No header candidates for '{}'", field)));
            }
            for candidate in candidates {
                if candidate.is_empty() {
                    return Err(Error::Config(format!(
                        "Empty header candidate for '{}'",
                        field
                    )));
                }
                if let Some(owner) = owners.insert(candidate.as_str(), *field) {
                    let kind = if owner == *field { "Duplicate" } else { "Ambiguous" };
                    return Err(Error::Config(format!(
                        "{} header candidate '{}' (listed for '{}' and '{}')",
                        kind, candidate, owner, field
                    )));
                }
            }
        }
        if !self.entries.iter().any(|(f, _)| *f == CanonicalField::Title) {
            return Err(Error::Config("Candidate table has no 'title' entry".to_string()));
        }
        Ok(())
    }

    pub fn candidates(&self, field: CanonicalField) -> &[String] {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, c)| c.as_slice())
            .unwrap_or(&[])
    }

    /// Bind canonical fields to column indexes of `headers`
    ///
    /// For each field, candidates are tried in priority order and the first
    /// header matching a candidate wins. If two headers normalize to the same
    /// spelling, the leftmost one is used.
    pub fn bind(&self, headers: &[String]) -> ColumnBindings {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let mut columns = HashMap::new();

        for (field, candidates) in &self.entries {
            let hit = candidates.iter().find_map(|candidate| {
                normalized
                    .iter()
                    .position(|h| h == candidate)
                    .map(|index| (candidate, index))
            });
            if let Some((candidate, index)) = hit {
                debug!(field = %field, header = %headers[index], candidate = %candidate, "Bound column");
                columns.insert(*field, index);
            }
        }

        ColumnBindings { columns }
    }
}

/// Resolved field → column index mapping for one sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnBindings {
    columns: HashMap<CanonicalField, usize>,
}

impl ColumnBindings {
    pub fn column(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    /// Column of the mandatory title field, or `Error::Schema`
    pub fn require_title(&self, table: &SheetTable, candidates: &ColumnCandidateTable) -> Result<usize> {
        self.column(CanonicalField::Title).ok_or_else(|| {
            Error::Schema(format!(
                "Could not find a column for 'title' in sheet '{}' (candidates: {})",
                table.name,
                candidates.candidates(CanonicalField::Title).join(", ")
            ))
        })
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve a raw sheet into canonical rows
///
/// Fails with `Error::Schema` when no header matches a title candidate.
/// Every data row yields one canonical row, in sheet order.
pub fn resolve(table: &SheetTable, candidates: &ColumnCandidateTable) -> Result<Vec<CanonicalRow>> {
    let bindings = candidates.bind(&table.headers);
    let title_col = bindings.require_title(table, candidates)?;

    let text = |row: usize, field: CanonicalField| {
        bindings
            .column(field)
            .and_then(|col| table.cell(row, col).as_text())
    };
    let number = |row: usize, field: CanonicalField| {
        bindings
            .column(field)
            .and_then(|col| coerce_number(table.cell(row, col)))
    };

    let mut rows = Vec::with_capacity(table.rows.len());
    for idx in 0..table.rows.len() {
        let title = table
            .cell(idx, title_col)
            .as_text()
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        let mut row = CanonicalRow::new(idx, title);
        row.platform = text(idx, CanonicalField::Platform);
        row.completed_on = bindings
            .column(CanonicalField::CompletedOn)
            .and_then(|col| coerce_date(table.cell(idx, col)));
        row.hours = number(idx, CanonicalField::Hours).filter(|h| *h >= 0.0);
        row.rating = text(idx, CanonicalField::Rating);
        row.developer = text(idx, CanonicalField::Developer);
        row.metascore = number(idx, CanonicalField::Metascore).and_then(coerce_score);
        row.metascore_platform = number(idx, CanonicalField::MetascorePlatform).and_then(coerce_score);
        row.metacritic_url = text(idx, CanonicalField::MetacriticUrl);
        row.metacritic_count = number(idx, CanonicalField::MetacriticCount)
            .filter(|n| *n >= 0.0)
            .map(|n| n.trunc() as i64);
        rows.push(row);
    }

    let unknown = rows.iter().filter(|r| r.has_unknown_title()).count();
    if unknown > 0 {
        warn!(sheet = %table.name, unknown, "Rows without a title kept with placeholder");
    }

    Ok(rows)
}

/// Numeric cell or numeric text; anything else is empty
pub fn coerce_number(cell: &CellValue) -> Option<f64> {
    let value = match cell {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Truncate to an integer score in 0..=100
fn coerce_score(value: f64) -> Option<i64> {
    let score = value.trunc() as i64;
    (0..=100).contains(&score).then_some(score)
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Date cell, Excel serial number, or date-like text; anything else is empty
pub fn coerce_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::DateTime(dt) => Some(dt.date()),
        CellValue::Number(serial) => from_excel_serial(*serial).map(|dt| dt.date()),
        CellValue::Text(s) => parse_date_text(s.trim()),
        CellValue::Bool(_) | CellValue::Empty => None,
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
    {
        return Some(date);
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt.date());
    }
    // Bare year: first day of that year
    if text.len() == 4 && text.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = text.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }
    None
}

/// Completion year of a row, for analytics
pub fn completion_year(row: &CanonicalRow) -> Option<i32> {
    row.completed_on.map(|d| d.year())
}
