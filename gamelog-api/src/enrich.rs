//! Enrichment orchestration
//!
//! Fills missing metascores: cache first, catalog on a miss, and every new
//! catalog result is written to the cache before the next row is touched.
//! Rows are processed one at a time with a politeness delay between
//! lookups. A row that cannot be enriched is logged and skipped; it never
//! stops the batch.

use crate::cache::{CacheKey, EnrichmentCache, KeyStrategy};
use crate::catalog::{extract_scores, CatalogSource, Lookup};
use crate::models::{CanonicalRow, EnrichmentResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Where an enrichment value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentSource {
    Cache,
    Catalog,
}

/// Enrichment for one title
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrichment {
    pub source: EnrichmentSource,
    #[serde(flatten)]
    pub result: EnrichmentResult,
}

/// Counts for one `enrich_missing` batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    /// Rows without a metascore at the start of the batch
    pub missing: usize,
    /// Rows that now carry a metascore
    pub updated: usize,
    /// Of the updated rows, how many were served from the cache
    pub from_cache: usize,
    /// Rows with no match or a match without a score
    pub not_found: usize,
    /// Rows skipped because their title is the placeholder
    pub skipped: usize,
}

/// Cache-then-catalog enrichment
#[derive(Clone)]
pub struct Enricher {
    cache: EnrichmentCache,
    catalog: Arc<dyn CatalogSource>,
    key_strategy: KeyStrategy,
    row_delay: Duration,
}

impl Enricher {
    pub fn new(
        cache: EnrichmentCache,
        catalog: Arc<dyn CatalogSource>,
        key_strategy: KeyStrategy,
        row_delay: Duration,
    ) -> Self {
        Self {
            cache,
            catalog,
            key_strategy,
            row_delay,
        }
    }

    /// Enrichment for one title: fresh cache entry, else a catalog lookup
    ///
    /// Catalog results are stored in the cache before returning. Cache
    /// failures are logged and treated as a miss / skipped write.
    /// `platform` is dropped under `KeyStrategy::TitleOnly`.
    pub async fn enrich_row(&self, title: &str, platform: Option<&str>) -> Lookup<Enrichment> {
        let platform_id = self.key_strategy.platform_id(platform);
        let key = CacheKey::new(title, platform_id);

        match self.cache.get(&key).await {
            Ok(Some(entry)) => {
                debug!(key = %key, "Cache hit");
                return Lookup::Found(Enrichment {
                    source: EnrichmentSource::Cache,
                    result: entry.to_enrichment(),
                });
            }
            Ok(None) => debug!(key = %key, "Cache miss"),
            Err(e) => warn!(key = %key, error = %e, "Cache read failed, treating as miss"),
        }

        let item = match self.catalog.lookup(title, platform_id).await {
            Lookup::Found(item) => item,
            Lookup::NotFound => return Lookup::NotFound,
        };

        let result = extract_scores(&item, platform_id);
        if let Err(e) = self.cache.put(&key, &result).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }

        Lookup::Found(Enrichment {
            source: EnrichmentSource::Catalog,
            result,
        })
    }

    /// Fill every row whose metascore is empty
    ///
    /// Rows are updated in place, in order.
    pub async fn enrich_missing(&self, rows: &mut [CanonicalRow]) -> EnrichmentReport {
        let mut report = EnrichmentReport::default();
        let missing: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.metascore.is_none())
            .map(|(i, _)| i)
            .collect();
        report.missing = missing.len();

        if missing.is_empty() {
            info!("All rows already have metascores");
            return report;
        }
        info!(missing = report.missing, total = rows.len(), "Enriching rows missing a metascore");

        let mut first_lookup = true;
        for i in missing {
            let row = &mut rows[i];
            if row.has_unknown_title() {
                report.skipped += 1;
                continue;
            }

            if !first_lookup && !self.row_delay.is_zero() {
                sleep(self.row_delay).await;
            }
            first_lookup = false;

            let title = row.title.clone();
            let platform = row.platform.clone();
            match self.enrich_row(&title, platform.as_deref()).await {
                Lookup::Found(enrichment) => {
                    row.apply_enrichment(&enrichment.result);
                    match row.metascore {
                        Some(score) => {
                            report.updated += 1;
                            if enrichment.source == EnrichmentSource::Cache {
                                report.from_cache += 1;
                            }
                            info!(title = %title, metascore = score, source = ?enrichment.source, "✓ Enriched");
                        }
                        None => {
                            report.not_found += 1;
                            debug!(title = %title, "Match has no metascore");
                        }
                    }
                }
                Lookup::NotFound => {
                    report.not_found += 1;
                    debug!(title = %title, "No enrichment found");
                }
            }
        }

        info!(
            updated = report.updated,
            missing = report.missing,
            not_found = report.not_found,
            "Enrichment batch complete: {}/{} missing metascores filled",
            report.updated,
            report.missing
        );
        report
    }
}
