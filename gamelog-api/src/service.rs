//! Game log service
//!
//! Wires the resolver, cache, catalog client, orchestrator and merger into
//! the operations the HTTP layer and the startup job call.

use crate::analytics::{compute_analytics, Analytics};
use crate::cache::{EnrichmentCache, KeyStrategy};
use crate::catalog::{CatalogClient, CatalogSource, Lookup};
use crate::enrich::{Enricher, Enrichment, EnrichmentReport};
use crate::models::CanonicalRow;
use crate::schema::{resolve, ColumnCandidateTable};
use crate::sheet::{file_version, read_workbook};
use crate::writeback::{FlushReport, WriteBackMerger};
use gamelog_common::config::{Settings, SpreadsheetSettings};
use gamelog_common::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct GameLog {
    spreadsheet: SpreadsheetSettings,
    candidates: ColumnCandidateTable,
    cache: EnrichmentCache,
    enricher: Enricher,
    merger: WriteBackMerger,
}

impl GameLog {
    /// Build the service from resolved settings
    ///
    /// Opens the cache database and validates the column candidate table;
    /// both failures are fatal at startup.
    pub async fn open(settings: &Settings) -> Result<Self> {
        let candidates = ColumnCandidateTable::with_overrides(&settings.columns)?;
        let cache = EnrichmentCache::open(&settings.cache.path, settings.cache.max_age).await?;
        let catalog: Arc<dyn CatalogSource> = Arc::new(CatalogClient::new(&settings.catalog)?);

        Ok(Self::new(
            settings.spreadsheet.clone(),
            candidates,
            cache,
            catalog,
            KeyStrategy::from_platform_aware(settings.enrich.platform_aware_keys),
            settings.enrich.politeness_delay,
        ))
    }

    pub fn new(
        spreadsheet: SpreadsheetSettings,
        candidates: ColumnCandidateTable,
        cache: EnrichmentCache,
        catalog: Arc<dyn CatalogSource>,
        key_strategy: KeyStrategy,
        row_delay: Duration,
    ) -> Self {
        let enricher = Enricher::new(cache.clone(), catalog, key_strategy, row_delay);
        let merger = WriteBackMerger::new(cache.clone(), candidates.clone(), key_strategy);
        Self {
            spreadsheet,
            candidates,
            cache,
            enricher,
            merger,
        }
    }

    /// Read the preferred sheet and resolve it into canonical rows
    ///
    /// Parsing runs on the blocking pool so large sheets do not stall
    /// request handling.
    pub async fn read_canonical_table(&self) -> Result<Vec<CanonicalRow>> {
        let path = self.spreadsheet.path.clone();
        let preferred = self.spreadsheet.preferred_sheet.clone();
        let candidates = self.candidates.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<CanonicalRow>> {
            let workbook = read_workbook(&path)?;
            let sheet = workbook.select(preferred.as_deref())?;
            let rows = resolve(sheet, &candidates)?;
            debug!(sheet = %sheet.name, rows = rows.len(), "Read canonical table");
            Ok(rows)
        })
        .await
        .map_err(|e| Error::Internal(format!("Spreadsheet read task failed: {}", e)))?
    }

    /// Cache-then-catalog enrichment for a single title
    pub async fn enrich_row(&self, title: &str, platform: Option<&str>) -> Lookup<Enrichment> {
        self.enricher.enrich_row(title, platform).await
    }

    /// Read the sheet and fill every row missing a metascore
    ///
    /// Only the cache is updated; the file changes on `flush_enrichment`.
    pub async fn enrich_missing(&self) -> Result<EnrichmentReport> {
        let mut rows = self.read_canonical_table().await?;
        Ok(self.enricher.enrich_missing(&mut rows).await)
    }

    /// Merge fresh cached scores into the spreadsheet file
    pub async fn flush_enrichment(&self) -> Result<FlushReport> {
        self.merger
            .flush(&self.spreadsheet.path, self.spreadsheet.preferred_sheet.as_deref())
            .await
    }

    pub fn compute_analytics(&self, rows: &[CanonicalRow]) -> Analytics {
        compute_analytics(rows)
    }

    /// Change marker of the spreadsheet file
    pub fn file_version(&self) -> String {
        file_version(&self.spreadsheet.path)
    }

    /// Release the cache; call once at shutdown
    pub async fn close(&self) {
        self.cache.close().await;
        info!("Game log service stopped");
    }
}
