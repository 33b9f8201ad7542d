//! Aggregates over the canonical table

use crate::models::CanonicalRow;
use crate::schema::completion_year;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Analytics {
    pub platform_counts: BTreeMap<String, usize>,
    pub year_counts: BTreeMap<String, usize>,
}

/// Rows per platform, keyed by the trimmed, title-cased platform name
pub fn platform_counts(rows: &[CanonicalRow]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for platform in rows.iter().filter_map(|r| r.platform.as_deref()) {
        let platform = platform.trim();
        if platform.is_empty() {
            continue;
        }
        *counts.entry(title_case(platform)).or_insert(0) += 1;
    }
    counts
}

/// Rows per completion year, ascending; rows without a date are skipped
pub fn year_counts(rows: &[CanonicalRow]) -> BTreeMap<String, usize> {
    let mut by_year: BTreeMap<i32, usize> = BTreeMap::new();
    for year in rows.iter().filter_map(completion_year) {
        *by_year.entry(year).or_insert(0) += 1;
    }
    by_year
        .into_iter()
        .map(|(year, count)| (year.to_string(), count))
        .collect()
}

pub fn compute_analytics(rows: &[CanonicalRow]) -> Analytics {
    Analytics {
        platform_counts: platform_counts(rows),
        year_counts: year_counts(rows),
    }
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(idx: usize, platform: Option<&str>, completed: Option<(i32, u32, u32)>) -> CanonicalRow {
        let mut row = CanonicalRow::new(idx, format!("Game {}", idx));
        row.platform = platform.map(str::to_string);
        row.completed_on = completed.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        row
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("xbox one"), "Xbox One");
        assert_eq!(title_case("PS5"), "Ps5");
        assert_eq!(title_case("nintendo SWITCH"), "Nintendo Switch");
    }

    #[test]
    fn test_platform_counts_merge_spellings() {
        let rows = vec![
            row(0, Some("PC"), None),
            row(1, Some(" pc "), None),
            row(2, Some("Nintendo Switch"), None),
            row(3, None, None),
            row(4, Some("  "), None),
        ];
        let counts = platform_counts(&rows);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["Pc"], 2);
        assert_eq!(counts["Nintendo Switch"], 1);
    }

    #[test]
    fn test_year_counts_ascending() {
        let rows = vec![
            row(0, None, Some((2023, 5, 1))),
            row(1, None, Some((2021, 1, 9))),
            row(2, None, Some((2023, 12, 31))),
            row(3, None, None),
        ];
        let counts = year_counts(&rows);
        let keys: Vec<_> = counts.keys().cloned().collect();
        assert_eq!(keys, vec!["2021", "2023"]);
        assert_eq!(counts["2023"], 2);
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(compute_analytics(&[]), Analytics::default());
    }
}
