//! Cache database initialization tests

use gamelog_common::db::{create_meta_cache_table, init_cache_database, sync_meta_cache_columns};
use sqlx::Row;

async fn column_names(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query("PRAGMA table_info(meta_cache)")
        .fetch_all(pool)
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect()
}

#[tokio::test]
async fn test_init_creates_database_and_table() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("cache.sqlite");

    let pool = init_cache_database(&db_path).await.unwrap();
    assert!(db_path.exists());

    let columns = column_names(&pool).await;
    for expected in ["key", "metascore", "url", "rating_count", "fetched_at", "platform_metascore"] {
        assert!(columns.iter().any(|c| c == expected), "missing column {}", expected);
    }
    pool.close().await;
}

#[tokio::test]
async fn test_init_is_idempotent_and_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cache.sqlite");

    let pool = init_cache_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO meta_cache(key, metascore, url, rating_count, fetched_at) VALUES ('hades|none', 93, NULL, 10, 1)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_cache_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM meta_cache")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
    pool.close().await;
}

#[tokio::test]
async fn test_legacy_table_gains_platform_column() {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    // Layout written by older deployments
    sqlx::query(
        "CREATE TABLE meta_cache (key TEXT PRIMARY KEY, metascore INTEGER, url TEXT, rating_count INTEGER, fetched_at INTEGER)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let added = sync_meta_cache_columns(&pool).await.unwrap();
    assert_eq!(added, vec!["platform_metascore".to_string()]);

    // Second pass is a no-op
    create_meta_cache_table(&pool).await.unwrap();
    let added_again = sync_meta_cache_columns(&pool).await.unwrap();
    assert!(added_again.is_empty());
    assert!(column_names(&pool).await.contains(&"platform_metascore".to_string()));
}
