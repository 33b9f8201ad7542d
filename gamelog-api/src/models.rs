//! Canonical data types shared across the enrichment pipeline

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Placeholder title for rows whose title cell is empty
///
/// Such rows are kept so row counts match the source sheet, but they are
/// never sent to the catalog.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// One normalized game-log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    /// Ordinal position within one read of the sheet
    pub idx: usize,
    pub title: String,
    pub platform: Option<String>,
    pub completed_on: Option<NaiveDate>,
    pub hours: Option<f64>,
    /// Personal category / tier column
    pub rating: Option<String>,
    pub developer: Option<String>,
    pub metascore: Option<i64>,
    pub metascore_platform: Option<i64>,
    pub metacritic_url: Option<String>,
    pub metacritic_count: Option<i64>,
}

impl CanonicalRow {
    /// Empty row carrying only a title
    pub fn new(idx: usize, title: impl Into<String>) -> Self {
        Self {
            idx,
            title: title.into(),
            platform: None,
            completed_on: None,
            hours: None,
            rating: None,
            developer: None,
            metascore: None,
            metascore_platform: None,
            metacritic_url: None,
            metacritic_count: None,
        }
    }

    /// True when the title is the placeholder and cannot be looked up
    pub fn has_unknown_title(&self) -> bool {
        self.title.trim().is_empty() || self.title == UNKNOWN_TITLE
    }

    /// Copy enrichment values onto the row
    ///
    /// Absent enrichment values never erase values already on the row.
    pub fn apply_enrichment(&mut self, enrichment: &EnrichmentResult) {
        if enrichment.metascore.is_some() {
            self.metascore = enrichment.metascore;
        }
        if enrichment.metascore_platform.is_some() {
            self.metascore_platform = enrichment.metascore_platform;
        }
        if let Some(url) = &enrichment.metacritic_url {
            self.metacritic_url = Some(url.clone());
        }
        if enrichment.metacritic_count.is_some() {
            self.metacritic_count = enrichment.metacritic_count;
        }
    }
}

/// Review metadata extracted from a catalog match or read from the cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    /// Aggregate score across platforms
    pub metascore: Option<i64>,
    /// Score for the requested platform, when one was requested and listed
    pub metascore_platform: Option<i64>,
    pub metacritic_url: Option<String>,
    pub metacritic_count: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_title_detection() {
        assert!(CanonicalRow::new(0, UNKNOWN_TITLE).has_unknown_title());
        assert!(CanonicalRow::new(0, "  ").has_unknown_title());
        assert!(!CanonicalRow::new(0, "Hades").has_unknown_title());
    }

    #[test]
    fn test_apply_enrichment_keeps_existing_values_for_absent_fields() {
        let mut row = CanonicalRow::new(3, "Hades");
        row.metacritic_url = Some("https://example.test/hades".to_string());

        row.apply_enrichment(&EnrichmentResult {
            metascore: Some(93),
            metascore_platform: None,
            metacritic_url: None,
            metacritic_count: Some(1200),
        });

        assert_eq!(row.metascore, Some(93));
        assert_eq!(row.metacritic_url.as_deref(), Some("https://example.test/hades"));
        assert_eq!(row.metacritic_count, Some(1200));
        assert_eq!(row.idx, 3);
    }
}
