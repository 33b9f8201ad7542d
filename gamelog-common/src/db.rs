//! Enrichment cache database initialization
//!
//! Three-phase startup, all idempotent:
//! 1. **CREATE TABLE IF NOT EXISTS** for `meta_cache`
//! 2. **Column sync** - add columns newer builds expect via ALTER TABLE
//! 3. **Pragmas** - WAL journal and busy timeout for concurrent writers

use crate::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::info;

/// Table holding fetched review metadata
pub const META_CACHE_TABLE: &str = "meta_cache";

/// Columns added after the first table layout: (name, SQL type)
const ADDITIVE_COLUMNS: &[(&str, &str)] = &[("platform_metascore", "INTEGER")];

/// Open (creating if needed) the cache database and ensure its schema
pub async fn init_cache_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new cache database: {}", db_path.display());
    } else {
        info!("Opened existing cache database: {}", db_path.display());
    }

    // WAL allows concurrent readers alongside one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_meta_cache_table(&pool).await?;

    Ok(pool)
}

/// Create the cache table and bring its columns up to date
pub async fn create_meta_cache_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta_cache (
            key TEXT PRIMARY KEY,
            metascore INTEGER,
            url TEXT,
            rating_count INTEGER,
            fetched_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sync_meta_cache_columns(pool).await?;
    Ok(())
}

/// Add any missing additive columns to an existing `meta_cache` table
///
/// Returns the names of the columns that were added.
pub async fn sync_meta_cache_columns(pool: &SqlitePool) -> Result<Vec<String>> {
    let existing: Vec<String> = sqlx::query("PRAGMA table_info(meta_cache)")
        .fetch_all(pool)
        .await?
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();

    let mut added = Vec::new();
    for (name, sql_type) in ADDITIVE_COLUMNS {
        if existing.iter().any(|col| col == name) {
            continue;
        }
        let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", META_CACHE_TABLE, name, sql_type);
        sqlx::query(&sql).execute(pool).await?;
        info!(column = %name, "Added missing column to {}", META_CACHE_TABLE);
        added.push(name.to_string());
    }

    Ok(added)
}
