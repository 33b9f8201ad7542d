//! Shared fixtures for gamelog-api integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use gamelog_api::cache::{EnrichmentCache, KeyStrategy};
use gamelog_api::catalog::{CatalogItem, CatalogSource, Lookup};
use gamelog_api::schema::ColumnCandidateTable;
use gamelog_api::service::GameLog;
use gamelog_api::sheet::{write_workbook, CellValue, SheetTable, Workbook};
use gamelog_common::config::SpreadsheetSettings;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// In-process catalog answering from a fixed title → score table
#[derive(Default)]
pub struct StubCatalog {
    scores: HashMap<String, i64>,
    calls: Mutex<Vec<String>>,
}

impl StubCatalog {
    pub fn with(scores: &[(&str, i64)]) -> Self {
        Self {
            scores: scores.iter().map(|(t, s)| (t.to_string(), *s)).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogSource for StubCatalog {
    async fn lookup(&self, title: &str, _platform_id: Option<u32>) -> Lookup<CatalogItem> {
        self.calls.lock().unwrap().push(title.to_string());
        match self.scores.get(title) {
            Some(score) => Lookup::Found(CatalogItem {
                name: Some(title.to_string()),
                metacritic: Some(*score),
                ..Default::default()
            }),
            None => Lookup::NotFound,
        }
    }
}

pub fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

pub fn number(n: f64) -> CellValue {
    CellValue::Number(n)
}

/// Write a single-sheet workbook plus an untouched "Notes" sheet
pub fn write_game_sheet(path: &Path, headers: &[&str], rows: Vec<Vec<CellValue>>) {
    let workbook = Workbook {
        sheets: vec![
            SheetTable::new(
                "Raw Data",
                headers.iter().map(|h| h.to_string()).collect(),
                rows,
            ),
            SheetTable::new(
                "Notes",
                vec!["note".to_string()],
                vec![vec![text("keep me")]],
            ),
        ],
    };
    write_workbook(path, &workbook).unwrap();
}

/// The Hades / Celeste log used across the flow tests
pub fn write_hades_celeste(path: &Path) {
    write_game_sheet(
        path,
        &["Name Of The Game", "Platform", "Hours", "Metascore"],
        vec![
            vec![text("Hades"), text("PC"), number(60.0), CellValue::Empty],
            vec![text("Celeste"), text("Switch"), number(12.5), number(90.0)],
        ],
    );
}

pub struct TestLog {
    pub dir: TempDir,
    pub path: PathBuf,
    pub catalog: Arc<StubCatalog>,
    pub service: Arc<GameLog>,
}

/// Service over `games.xlsx` in a fresh temp dir with a file-backed cache
pub async fn test_log(catalog: StubCatalog, write: impl FnOnce(&Path)) -> TestLog {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("games.xlsx");
    write(&path);

    let cache = EnrichmentCache::open(&dir.path().join("cache.sqlite"), Duration::from_secs(30 * 86_400))
        .await
        .unwrap();
    let catalog = Arc::new(catalog);
    let service = GameLog::new(
        SpreadsheetSettings {
            path: path.clone(),
            preferred_sheet: Some("Raw Data".to_string()),
        },
        ColumnCandidateTable::default(),
        cache,
        catalog.clone(),
        KeyStrategy::TitleOnly,
        Duration::ZERO,
    );

    TestLog {
        dir,
        path,
        catalog,
        service: Arc::new(service),
    }
}
