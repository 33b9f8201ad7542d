//! Write-back of cached metascores into the spreadsheet
//!
//! The merge always starts from a fresh read of the file, never from an
//! in-memory table, so edits made outside the service since the last read
//! survive. Rows are matched to cache entries through the same column
//! bindings the read path uses, then the whole workbook is rewritten.
//!
//! Known gaps: there is no file lock against concurrent writers, and the
//! rewrite is not crash-safe (no staging file + rename).

use crate::cache::{EnrichmentCache, KeyStrategy};
use crate::schema::{CanonicalField, ColumnCandidateTable};
use crate::sheet::{read_workbook, write_workbook, CellValue};
use gamelog_common::{Error, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Header used when the sheet has no score column yet
pub const SCORE_COLUMN_HEADER: &str = "metascore";

/// Outcome of one flush
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub sheet: String,
    pub rows: usize,
    /// Rows whose score cell was set from the cache
    pub overwritten: usize,
    /// Of those, rows whose cell value actually changed
    pub changed: usize,
    pub column_added: bool,
}

/// Merges fresh cache entries into the spreadsheet file
#[derive(Debug, Clone)]
pub struct WriteBackMerger {
    cache: EnrichmentCache,
    candidates: ColumnCandidateTable,
    key_strategy: KeyStrategy,
}

impl WriteBackMerger {
    pub fn new(cache: EnrichmentCache, candidates: ColumnCandidateTable, key_strategy: KeyStrategy) -> Self {
        Self {
            cache,
            candidates,
            key_strategy,
        }
    }

    /// Re-read `path`, overlay cached scores, and rewrite the whole file
    ///
    /// Fails with `Error::Io`/`Error::Spreadsheet` when the file cannot be
    /// read or written and `Error::Schema` when no title column resolves.
    /// Workbook parsing and serialization run on the blocking pool.
    pub async fn flush(&self, path: &Path, preferred_sheet: Option<&str>) -> Result<FlushReport> {
        let read_path = path.to_path_buf();
        let mut workbook = tokio::task::spawn_blocking(move || read_workbook(&read_path))
            .await
            .map_err(|e| Error::Internal(format!("Spreadsheet read task failed: {}", e)))??;
        let index = workbook.select_index(preferred_sheet)?;
        let sheet = &mut workbook.sheets[index];

        let bindings = self.candidates.bind(&sheet.headers);
        let title_col = bindings.require_title(sheet, &self.candidates)?;
        let platform_col = bindings.column(CanonicalField::Platform);
        let (score_col, column_added) = match bindings.column(CanonicalField::Metascore) {
            Some(col) => (col, false),
            None => {
                debug!(sheet = %sheet.name, "Adding score column");
                (sheet.push_column(SCORE_COLUMN_HEADER), true)
            }
        };

        let mut overwritten = 0;
        let mut changed = 0;
        for row in 0..sheet.rows.len() {
            let Some(title) = sheet.cell(row, title_col).as_text() else {
                continue;
            };
            let platform = platform_col.and_then(|col| sheet.cell(row, col).as_text());
            let key = self.key_strategy.key_for(&title, platform.as_deref());

            let entry = match self.cache.get(&key).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache read failed during write-back, row left as is");
                    continue;
                }
            };
            let Some(score) = entry.metascore else {
                continue;
            };

            let value = CellValue::Number(score as f64);
            if sheet.cell(row, score_col) != &value {
                changed += 1;
            }
            sheet.set_cell(row, score_col, value);
            overwritten += 1;
        }

        let report = FlushReport {
            sheet: sheet.name.clone(),
            rows: sheet.rows.len(),
            overwritten,
            changed,
            column_added,
        };

        let write_path = path.to_path_buf();
        tokio::task::spawn_blocking(move || write_workbook(&write_path, &workbook))
            .await
            .map_err(|e| Error::Internal(format!("Spreadsheet write task failed: {}", e)))??;
        info!(
            sheet = %report.sheet,
            overwritten = report.overwritten,
            changed = report.changed,
            "Metascores written back to {}",
            path.display()
        );
        Ok(report)
    }
}
