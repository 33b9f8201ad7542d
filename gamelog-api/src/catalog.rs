//! Catalog client
//!
//! Queries the external review catalog (`GET {base}/games?search=...`) for
//! the single best match of a title.
//!
//! Throttling has two parts:
//! - an admission gate (semaphore) bounding in-flight requests
//! - a trailing delay of `1 / requests_per_second` after every request,
//!   paid whether the request succeeded or not
//!
//! A 429 response is retried with exponential backoff (`unit * 2^attempt`)
//! up to `max_retries` times. Every other failure (non-200 status, transport
//! fault, malformed body) ends the lookup as `NotFound`: enrichment is
//! best-effort and never fails the caller.

use crate::models::EnrichmentResult;
use async_trait::async_trait;
use gamelog_common::config::CatalogSettings;
use gamelog_common::{Error, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("gamelog/", env!("CARGO_PKG_VERSION"));

/// Outcome of a lookup: a match, or no enrichment data available
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

/// Why a single request did not produce a result (logged, never returned)
#[derive(Debug, Error)]
enum FetchError {
    #[error("rate limited (429)")]
    RateLimited,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("transport fault: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Option<Vec<CatalogItem>>,
}

/// One catalog search result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(default)]
    pub name: Option<String>,
    /// Aggregate metascore
    #[serde(default)]
    pub metacritic: Option<i64>,
    #[serde(default)]
    pub metacritic_url: Option<String>,
    #[serde(default)]
    pub ratings_count: Option<i64>,
    #[serde(default)]
    pub metacritic_platforms: Option<Vec<PlatformScore>>,
}

/// Per-platform score entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformScore {
    #[serde(default)]
    pub metascore: Option<i64>,
    pub platform: PlatformRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformRef {
    #[serde(alias = "platform")]
    pub id: u32,
}

/// Pull review metadata out of a catalog item
///
/// With a platform id, the score listed for exactly that platform fills
/// `metascore_platform`; without one (or without a listing), it falls back
/// to the aggregate score. `metascore` always carries the aggregate.
pub fn extract_scores(item: &CatalogItem, platform_id: Option<u32>) -> EnrichmentResult {
    let platform_score = platform_id.and_then(|id| {
        item.metacritic_platforms
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|entry| entry.platform.id == id)
            .and_then(|entry| entry.metascore)
    });

    EnrichmentResult {
        metascore: item.metacritic,
        metascore_platform: platform_id.and(platform_score.or(item.metacritic)),
        metacritic_url: item.metacritic_url.clone(),
        metacritic_count: item.ratings_count,
    }
}

// ============================================================================
// Client
// ============================================================================

/// Source of catalog matches
///
/// Implemented by [`CatalogClient`]; the orchestrator depends only on this.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Best match for `title`, optionally filtered to one platform
    async fn lookup(&self, title: &str, platform_id: Option<u32>) -> Lookup<CatalogItem>;
}

/// HTTP client for the review catalog
pub struct CatalogClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    /// Admission gate for in-flight requests
    gate: Arc<Semaphore>,
    request_interval: Duration,
    max_retries: u32,
    backoff_unit: Duration,
}

impl CatalogClient {
    pub fn new(settings: &CatalogSettings) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        if settings.api_key.is_none() {
            warn!("Catalog API key not configured; enrichment lookups will find nothing");
        }
        info!(
            max_concurrent = settings.max_concurrent,
            interval_ms = settings.request_interval().as_millis() as u64,
            "Catalog client initialized"
        );

        Ok(Self {
            http_client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            gate: Arc::new(Semaphore::new(settings.max_concurrent.max(1))),
            request_interval: settings.request_interval(),
            max_retries: settings.max_retries,
            backoff_unit: settings.backoff_unit,
        })
    }

    /// Backoff before retry number `attempt + 1`
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(2u32.saturating_pow(attempt))
    }

    async fn fetch_once(
        &self,
        title: &str,
        platform_id: Option<u32>,
        api_key: &str,
    ) -> std::result::Result<Option<CatalogItem>, FetchError> {
        let mut query: Vec<(&str, String)> = vec![
            ("search", title.to_string()),
            ("page_size", "1".to_string()),
            ("key", api_key.to_string()),
        ];
        if let Some(id) = platform_id {
            query.push(("platforms", id.to_string()));
        }

        let response = self
            .http_client
            .get(format!("{}/games", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        Ok(body.results.unwrap_or_default().into_iter().next())
    }
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn lookup(&self, title: &str, platform_id: Option<u32>) -> Lookup<CatalogItem> {
        let title = title.trim();
        if title.is_empty() {
            return Lookup::NotFound;
        }
        let Some(api_key) = self.api_key.as_deref() else {
            debug!(title = %title, "Skipping catalog lookup: no API key");
            return Lookup::NotFound;
        };

        let Ok(_permit) = self.gate.acquire().await else {
            return Lookup::NotFound;
        };

        for attempt in 0..=self.max_retries {
            let outcome = self.fetch_once(title, platform_id, api_key).await;
            // Trailing delay keeps throughput under the rps ceiling
            sleep(self.request_interval).await;

            match outcome {
                Ok(Some(item)) => {
                    debug!(title = %title, matched = ?item.name, metascore = ?item.metacritic, "Catalog match");
                    return Lookup::Found(item);
                }
                Ok(None) => {
                    debug!(title = %title, "Catalog returned no results");
                    return Lookup::NotFound;
                }
                Err(FetchError::RateLimited) if attempt < self.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    warn!(title = %title, attempt, delay_ms = delay.as_millis() as u64, "Catalog rate limited, backing off");
                    sleep(delay).await;
                }
                Err(FetchError::RateLimited) => {
                    warn!(title = %title, retries = self.max_retries, "Catalog rate limit retries exhausted");
                    return Lookup::NotFound;
                }
                Err(e) => {
                    warn!(title = %title, error = %e, "Catalog lookup failed");
                    return Lookup::NotFound;
                }
            }
        }

        Lookup::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{RawQuery, State};
    use axum::http::{header, StatusCode as HttpStatus};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    /// Local stand-in for the catalog serving a fixed response script
    #[derive(Default)]
    struct ScriptedCatalog {
        responses: Mutex<VecDeque<(u16, String)>>,
        queries: Mutex<Vec<String>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
    }

    async fn handle(State(script): State<Arc<ScriptedCatalog>>, RawQuery(query): RawQuery) -> impl IntoResponse {
        script.calls.fetch_add(1, Ordering::SeqCst);
        script.queries.lock().unwrap().push(query.unwrap_or_default());

        let now = script.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        script.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        script.in_flight.fetch_sub(1, Ordering::SeqCst);

        let (status, body) = script
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((200, r#"{"results": []}"#.to_string()));
        (
            HttpStatus::from_u16(status).unwrap(),
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
    }

    async fn serve(script: ScriptedCatalog) -> (String, Arc<ScriptedCatalog>) {
        let script = Arc::new(script);
        let app = Router::new()
            .route("/api/games", get(handle))
            .with_state(script.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/api", addr), script)
    }

    fn script(responses: Vec<(u16, &str)>) -> ScriptedCatalog {
        ScriptedCatalog {
            responses: Mutex::new(responses.into_iter().map(|(s, b)| (s, b.to_string())).collect()),
            ..Default::default()
        }
    }

    fn settings(base_url: &str) -> CatalogSettings {
        CatalogSettings {
            base_url: base_url.to_string(),
            api_key: Some("test-key".to_string()),
            requests_per_second: 1000,
            max_concurrent: 4,
            max_retries: 3,
            timeout: Duration::from_secs(5),
            backoff_unit: Duration::from_millis(50),
        }
    }

    const HADES: &str = r#"{"results": [{"name": "Hades", "metacritic": 93, "metacritic_url": "https://www.metacritic.com/game/pc/hades", "ratings_count": 4100}]}"#;

    #[tokio::test]
    async fn test_lookup_found_sends_expected_query() {
        let (base, script) = serve(script(vec![(200, HADES)])).await;
        let client = CatalogClient::new(&settings(&base)).unwrap();

        let item = client.lookup("Hades", None).await.found().unwrap();
        assert_eq!(item.metacritic, Some(93));
        assert_eq!(item.ratings_count, Some(4100));

        let queries = script.queries.lock().unwrap().clone();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].contains("search=Hades"));
        assert!(queries[0].contains("page_size=1"));
        assert!(queries[0].contains("key=test-key"));
        assert!(!queries[0].contains("platforms="));
    }

    #[tokio::test]
    async fn test_lookup_with_platform_filter() {
        let body = r#"{"results": [{"metacritic": 75, "metacritic_platforms": [{"metascore": 70, "platform": {"id": 4}}, {"metascore": 82, "platform": {"id": 187}}]}]}"#;
        let (base, script) = serve(script(vec![(200, body)])).await;
        let client = CatalogClient::new(&settings(&base)).unwrap();

        let item = client.lookup("Returnal", Some(187)).await.found().unwrap();
        let scores = extract_scores(&item, Some(187));
        assert_eq!(scores.metascore_platform, Some(82));
        assert_eq!(scores.metascore, Some(75));

        let queries = script.queries.lock().unwrap().clone();
        assert!(queries[0].contains("platforms=187"));
    }

    #[tokio::test]
    async fn test_retry_after_rate_limit_then_success() {
        let (base, script) = serve(script(vec![(429, "{}"), (429, "{}"), (200, HADES)])).await;
        let client = CatalogClient::new(&settings(&base)).unwrap();

        let start = Instant::now();
        let lookup = client.lookup("Hades", None).await;
        let elapsed = start.elapsed();

        assert!(lookup.is_found());
        assert_eq!(script.calls.load(Ordering::SeqCst), 3);
        // Two backoffs: 50ms * 2^0 + 50ms * 2^1. A third would add 200ms more.
        assert!(elapsed >= Duration::from_millis(150), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(350), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_is_not_found() {
        let responses = vec![(429, "{}"); 4];
        let (base, script) = serve(script(responses)).await;
        let client = CatalogClient::new(&settings(&base)).unwrap();

        assert_eq!(client.lookup("Hades", None).await, Lookup::NotFound);
        // max_retries = 3 → 4 attempts in total
        assert_eq!(script.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_server_error_is_not_found_without_retry() {
        let (base, script) = serve(script(vec![(500, "{}"), (200, HADES)])).await;
        let client = CatalogClient::new(&settings(&base)).unwrap();

        assert_eq!(client.lookup("Hades", None).await, Lookup::NotFound);
        assert_eq!(script.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_request_still_waits_request_interval() {
        let (base, _script) = serve(script(vec![(500, "{}")])).await;
        let mut config = settings(&base);
        config.requests_per_second = 10;
        let client = CatalogClient::new(&config).unwrap();

        let start = Instant::now();
        assert_eq!(client.lookup("Hades", None).await, Lookup::NotFound);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_successful_request_waits_request_interval() {
        let (base, _script) = serve(script(vec![(200, HADES)])).await;
        let mut config = settings(&base);
        config.requests_per_second = 10;
        let client = CatalogClient::new(&config).unwrap();

        let start = Instant::now();
        assert!(client.lookup("Hades", None).await.is_found());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_sequential_lookups_respect_request_rate() {
        let (base, script) = serve(script(vec![(200, HADES); 3])).await;
        let mut config = settings(&base);
        config.requests_per_second = 10;
        let client = CatalogClient::new(&config).unwrap();

        let start = Instant::now();
        for _ in 0..3 {
            assert!(client.lookup("Hades", None).await.is_found());
        }
        let elapsed = start.elapsed();

        assert_eq!(script.calls.load(Ordering::SeqCst), 3);
        assert!(elapsed >= Duration::from_millis(300), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_found() {
        let (base, _script) = serve(script(vec![(200, "<html>oops</html>")])).await;
        let client = CatalogClient::new(&settings(&base)).unwrap();
        assert_eq!(client.lookup("Hades", None).await, Lookup::NotFound);
    }

    #[tokio::test]
    async fn test_empty_results_is_not_found() {
        let (base, _script) = serve(script(vec![(200, r#"{"results": null}"#)])).await;
        let client = CatalogClient::new(&settings(&base)).unwrap();
        assert_eq!(client.lookup("Nothing Like This", None).await, Lookup::NotFound);
    }

    #[tokio::test]
    async fn test_missing_api_key_skips_request() {
        let (base, script) = serve(script(vec![(200, HADES)])).await;
        let mut config = settings(&base);
        config.api_key = None;
        let client = CatalogClient::new(&config).unwrap();

        assert_eq!(client.lookup("Hades", None).await, Lookup::NotFound);
        assert_eq!(client.lookup("   ", None).await, Lookup::NotFound);
        assert_eq!(script.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transport_fault_is_not_found() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = CatalogClient::new(&settings(&format!("http://{}/api", addr))).unwrap();
        assert_eq!(client.lookup("Hades", None).await, Lookup::NotFound);
    }

    #[tokio::test]
    async fn test_admission_gate_bounds_in_flight_requests() {
        let mut scripted = script(vec![(200, HADES); 4]);
        scripted.delay = Duration::from_millis(40);
        let (base, script) = serve(scripted).await;

        let mut config = settings(&base);
        config.max_concurrent = 1;
        let client = Arc::new(CatalogClient::new(&config).unwrap());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let client = client.clone();
            handles.push(tokio::spawn(async move { client.lookup("Hades", None).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_found());
        }

        assert_eq!(script.calls.load(Ordering::SeqCst), 4);
        assert_eq!(script.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_extract_scores_prefers_platform_listing() {
        let item = CatalogItem {
            metacritic: Some(75),
            metacritic_platforms: Some(vec![PlatformScore {
                metascore: Some(82),
                platform: PlatformRef { id: 187 },
            }]),
            ..Default::default()
        };

        let with_platform = extract_scores(&item, Some(187));
        assert_eq!(with_platform.metascore_platform, Some(82));
        assert_eq!(with_platform.metascore, Some(75));

        // Platform not listed: fall back to aggregate
        assert_eq!(extract_scores(&item, Some(4)).metascore_platform, Some(75));
        // No platform requested: no platform score
        assert_eq!(extract_scores(&item, None).metascore_platform, None);
    }

    #[test]
    fn test_platform_ref_accepts_nested_platform_key() {
        let entry: PlatformScore =
            serde_json::from_str(r#"{"metascore": 88, "platform": {"platform": 7, "name": "Nintendo Switch"}}"#).unwrap();
        assert_eq!(entry.platform.id, 7);
    }

    #[test]
    fn test_backoff_doubles() {
        let client = CatalogClient::new(&settings("http://127.0.0.1:9/api")).unwrap();
        assert_eq!(client.backoff_delay(0), Duration::from_millis(50));
        assert_eq!(client.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(client.backoff_delay(3), Duration::from_millis(400));
    }
}
