//! Enrichment cache
//!
//! Persistent `key → review metadata` store backed by the `meta_cache`
//! SQLite table. Freshness is checked on read only: entries older than
//! `max_age` read as misses but stay in the table until a newer fetch
//! replaces them.
//!
//! The store is a process-lifetime resource: `open` at startup, share the
//! (cheaply cloneable) handle, `close` at shutdown. Each call checks out its
//! own pooled connection, so no lock is held across calls.

use crate::models::EnrichmentResult;
use chrono::Utc;
use gamelog_common::db::{create_meta_cache_table, init_cache_database};
use gamelog_common::Result;
use sqlx::SqlitePool;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Normalized lookup key: `"{lowercased title}|{platform id or none}"`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(title: &str, platform_id: Option<u32>) -> Self {
        let platform = platform_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "none".to_string());
        Self(format!("{}|{}", title.trim().to_lowercase(), platform))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How rows are turned into cache keys
///
/// The orchestrator and the write-back merger must agree on this, otherwise
/// the merge finds nothing to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// Title only; the platform column is ignored
    #[default]
    TitleOnly,
    /// Title plus the catalog platform id mapped from the platform column
    TitleAndPlatform,
}

impl KeyStrategy {
    pub fn from_platform_aware(platform_aware: bool) -> Self {
        if platform_aware {
            KeyStrategy::TitleAndPlatform
        } else {
            KeyStrategy::TitleOnly
        }
    }

    /// Platform id used for both the cache key and the catalog filter
    pub fn platform_id(&self, platform: Option<&str>) -> Option<u32> {
        match self {
            KeyStrategy::TitleOnly => None,
            KeyStrategy::TitleAndPlatform => crate::platforms::platform_id(platform),
        }
    }

    pub fn key_for(&self, title: &str, platform: Option<&str>) -> CacheKey {
        CacheKey::new(title, self.platform_id(platform))
    }
}

/// Cached review metadata for one key
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub metascore: Option<i64>,
    pub metascore_platform: Option<i64>,
    pub metacritic_url: Option<String>,
    pub metacritic_count: Option<i64>,
    /// Unix seconds
    pub fetched_at: i64,
}

impl CacheEntry {
    pub fn to_enrichment(&self) -> EnrichmentResult {
        EnrichmentResult {
            metascore: self.metascore,
            metascore_platform: self.metascore_platform,
            metacritic_url: self.metacritic_url.clone(),
            metacritic_count: self.metacritic_count,
        }
    }
}

type CacheRow = (Option<i64>, Option<i64>, Option<String>, Option<i64>, Option<i64>);

/// Handle to the enrichment cache
#[derive(Debug, Clone)]
pub struct EnrichmentCache {
    pool: SqlitePool,
    max_age: Duration,
}

impl EnrichmentCache {
    /// Open the cache database at `path`, creating file and schema if absent
    pub async fn open(path: &Path, max_age: Duration) -> Result<Self> {
        let pool = init_cache_database(path).await?;
        info!(max_age_days = max_age.as_secs() / 86_400, "Enrichment cache ready");
        Ok(Self { pool, max_age })
    }

    /// Wrap an existing pool, creating the schema if absent
    pub async fn from_pool(pool: SqlitePool, max_age: Duration) -> Result<Self> {
        create_meta_cache_table(&pool).await?;
        Ok(Self { pool, max_age })
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Enrichment cache closed");
    }

    /// Fresh entry for `key`, `None` when absent or stale
    pub async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        self.get_at(key, Utc::now().timestamp()).await
    }

    /// `get` against an explicit clock (unix seconds)
    pub async fn get_at(&self, key: &CacheKey, now: i64) -> Result<Option<CacheEntry>> {
        let row: Option<CacheRow> = sqlx::query_as(
            "SELECT metascore, platform_metascore, url, rating_count, fetched_at FROM meta_cache WHERE key = ?",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some((metascore, metascore_platform, metacritic_url, metacritic_count, fetched_at)) = row
        else {
            return Ok(None);
        };

        let fetched_at = fetched_at.unwrap_or(0);
        let age = now.saturating_sub(fetched_at);
        let max_age = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);
        if age > max_age {
            debug!(key = %key, age_secs = age, "Cache entry stale");
            return Ok(None);
        }

        Ok(Some(CacheEntry {
            metascore,
            metascore_platform,
            metacritic_url,
            metacritic_count,
            fetched_at,
        }))
    }

    /// Insert or replace the entry for `key`, stamped now
    pub async fn put(&self, key: &CacheKey, value: &EnrichmentResult) -> Result<()> {
        self.put_at(key, value, Utc::now().timestamp()).await
    }

    /// `put` with an explicit fetch time (unix seconds)
    pub async fn put_at(&self, key: &CacheKey, value: &EnrichmentResult, fetched_at: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO meta_cache
                (key, metascore, platform_metascore, url, rating_count, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(key.as_str())
        .bind(value.metascore)
        .bind(value.metascore_platform)
        .bind(value.metacritic_url.as_deref())
        .bind(value.metacritic_count)
        .bind(fetched_at)
        .execute(&self.pool)
        .await?;

        debug!(key = %key, metascore = ?value.metascore, "Cached enrichment");
        Ok(())
    }
}
