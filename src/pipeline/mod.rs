//! Pipeline orchestrator: fetch → extract (with fallback) → cache → normalize.
//!
//! Every operation resolves to a well-formed output value — an error string,
//! an empty list, or stale-but-valid data. Nothing here returns `Err` to the
//! boundary that calls it.

pub mod fallback;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::cache::{CacheState, DiskCache};
use crate::config::AppConfig;
use crate::models::{PricedTable, Source};
use crate::normalize::normalize_records;
use crate::scraper::http_client::HttpClient;
use crate::scraper::{FetchError, NewsScraper, build_search_url, price_source_for};

pub struct Pipeline {
    config: AppConfig,
    client: HttpClient,
    news: NewsScraper,
    cache: DiskCache,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = HttpClient::new(&config.fetch).context("Failed to build scraper")?;
        let cache = DiskCache::new(
            &config.cache,
            config.sources.iter().filter(|s| s.cache).map(|s| s.id.clone()),
        );
        let news = NewsScraper::new(client.clone());
        Ok(Self { config, client, news, cache })
    }

    fn source(&self, id: &str) -> Option<&Source> {
        self.config.sources.iter().find(|s| s.id == id)
    }

    /// The configured source table, for listing.
    pub fn sources(&self) -> &[Source] {
        &self.config.sources
    }

    // ── Headlines ─────────────────────────────────────────────────────────────

    /// Up to 5 unique headlines for a configured source. Sources with a
    /// `fallback_query` degrade to a search request when the category page
    /// yields nothing; total failure becomes a single error string.
    pub async fn get_headlines(&self, source_id: &str) -> Vec<String> {
        let Some(source) = self.source(source_id) else {
            return vec![format!("Error fetching news: unknown source '{}'", source_id)];
        };

        let result = match &source.fallback_query {
            Some(query) => {
                fallback::resolve(
                    &source.id,
                    self.news.fetch_headlines(&source.url),
                    self.search(query),
                )
                .await
            }
            None => self.news.fetch_headlines(&source.url).await,
        };

        match result {
            Ok(titles) => titles,
            Err(e) => {
                error!("Error fetching news from {}: {}", source.url, e);
                vec![format!("Error fetching news: {}", e)]
            }
        }
    }

    /// Search the news site. Empty list means "nothing found" — this
    /// operation never returns an error string.
    pub async fn search_headlines(&self, query: &str) -> Vec<String> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        match self.search(query).await {
            Ok(titles) => titles,
            Err(e) => {
                warn!("Search for '{}' failed: {}", query, e);
                Vec::new()
            }
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, FetchError> {
        let url = build_search_url(&self.config.search_url, query)?;
        self.news.fetch_headlines(&url).await
    }

    // ── Article summary ───────────────────────────────────────────────────────

    pub async fn get_article_summary(&self, url: &str) -> String {
        match self.news.fetch_summary(url).await {
            Ok(summary) => summary,
            Err(e) => {
                error!("Error summarizing article {}: {}", url, e);
                format!("Error summarizing article: {}", e)
            }
        }
    }

    // ── Priced tables ─────────────────────────────────────────────────────────

    /// Fetch, cache and normalize a priced source.
    ///
    /// Cacheable sources read through the disk cache: a fresh slot skips the
    /// network entirely; an expired slot is refreshed, but its payload still
    /// backs a degraded serve when the refresh fails after all retries.
    pub async fn get_priced_table(&self, source_id: &str) -> PricedTable {
        let Some(source) = self.source(source_id) else {
            return PricedTable::error(format!("Unknown source '{}'", source_id));
        };
        let Some(scraper) = price_source_for(&self.client, source) else {
            return PricedTable::error(format!("Source '{}' is not a priced source", source_id));
        };

        let stale = if source.cache {
            match self.cache.read(&source.id) {
                CacheState::Fresh(file) => {
                    debug!("Using cached data for {}", source.id);
                    return PricedTable::data(normalize_records(
                        &file.prices,
                        &source.url,
                        source.schema,
                    ));
                }
                CacheState::Stale(file) => Some(file),
                CacheState::Absent => None,
            }
        } else {
            None
        };

        match scraper.fetch_raw().await {
            Ok((prices, source_ts)) => {
                if source.cache {
                    if let Err(e) = self.cache.write(
                        &source.id,
                        &prices,
                        source_ts.as_deref().unwrap_or_default(),
                    ) {
                        warn!("Cache write for {} failed: {:#}", source.id, e);
                    }
                }
                PricedTable::data(normalize_records(&prices, &source.url, source.schema))
            }
            Err(e) => match stale {
                // freshness is preferred, availability wins on total failure
                Some(file) => {
                    info!("{}: fetch failed ({}), serving last cached payload", source.id, e);
                    PricedTable::data(normalize_records(&file.prices, &source.url, source.schema))
                }
                None => {
                    error!("{}: fetch failed with no cached payload: {}", source.id, e);
                    PricedTable::error(e.to_string())
                }
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, FetchConfig};
    use crate::models::{NormalizedRecord, NumericStyle, SchemaType, SourceKind};
    use chrono::{Duration, Utc};
    use serde_json::json;
    use std::path::Path;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// An address that refuses connections immediately.
    const DEAD_URL: &str = "http://127.0.0.1:1/";

    /// Serves `body` as a JSON 200 to every connection.
    async fn canned_json_server(body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let resp = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(resp.as_bytes()).await;
            }
        });
        format!("http://{}/", addr)
    }

    fn gold_source(cache: bool) -> Source {
        Source {
            id: "sjc-gold".to_string(),
            url: DEAD_URL.to_string(),
            kind: SourceKind::JsonApi,
            schema: SchemaType::Gold,
            numeric: NumericStyle::Decimal,
            cache,
            fallback_query: None,
        }
    }

    fn test_config(cache_dir: &Path, source: Source) -> AppConfig {
        AppConfig {
            fetch: FetchConfig {
                timeout_secs: 2,
                max_retries: 0,
                user_agent: "vnfeed-test".to_string(),
            },
            cache: CacheConfig { dir: cache_dir.to_path_buf(), ttl_secs: 3600 },
            search_url: "https://dantri.com.vn/tim-kiem/{query}.htm".to_string(),
            sources: vec![source],
        }
    }

    fn seed_cache(dir: &Path, age: Duration) {
        let file = json!({
            "prices": {
                "Vàng SJC 1L - Hà Nội": {"Mua vào": "148.3", "Bán ra": "150.3"}
            },
            "timestamp": "28/08/2026 09:00",
            "last_updated": (Utc::now() - age).to_rfc3339(),
        });
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("sjc-gold.json"), file.to_string()).unwrap();
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        seed_cache(dir.path(), Duration::minutes(5));
        // the source URL refuses connections, so data can only come from cache
        let pipeline = Pipeline::new(test_config(dir.path(), gold_source(true))).unwrap();

        match pipeline.get_priced_table("sjc-gold").await {
            PricedTable::Data { data, schema_version } => {
                assert_eq!(schema_version, "1.0");
                assert_eq!(data.len(), 1);
                assert_eq!(data[0].region(), Some("Hà Nội"));
            }
            PricedTable::Error { error } => panic!("expected cached data, got error: {}", error),
        }
    }

    #[tokio::test]
    async fn test_expired_cache_serves_stale_when_refresh_fails() {
        let dir = tempfile::tempdir().unwrap();
        seed_cache(dir.path(), Duration::hours(2));
        let pipeline = Pipeline::new(test_config(dir.path(), gold_source(true))).unwrap();

        match pipeline.get_priced_table("sjc-gold").await {
            PricedTable::Data { data, .. } => {
                assert_eq!(data.len(), 1);
                match &data[0] {
                    NormalizedRecord::Gold { price_buy, .. } => assert_eq!(price_buy, "148.3"),
                    other => panic!("expected gold record, got {:?}", other),
                }
            }
            PricedTable::Error { error } => panic!("expected stale serve, got error: {}", error),
        }
    }

    #[tokio::test]
    async fn test_expired_cache_replaced_by_successful_refresh() {
        let dir = tempfile::tempdir().unwrap();
        seed_cache(dir.path(), Duration::hours(2));

        let body = json!({
            "success": true,
            "latestDate": "29/08/2026 09:00",
            "data": [
                {"TypeName": "Vàng SJC 1L", "BranchName": "Đà Nẵng", "Buy": "152,000", "Sell": "154,000"}
            ]
        })
        .to_string();
        let mut source = gold_source(true);
        source.url = canned_json_server(body).await;
        let pipeline = Pipeline::new(test_config(dir.path(), source)).unwrap();

        // the fetch succeeds, so the stale payload must not leak through
        match pipeline.get_priced_table("sjc-gold").await {
            PricedTable::Data { data, .. } => {
                assert_eq!(data.len(), 1);
                assert_eq!(data[0].region(), Some("Đà Nẵng"));
                match &data[0] {
                    NormalizedRecord::Gold { price_buy, price_sell, .. } => {
                        assert_eq!(price_buy, "152");
                        assert_eq!(price_sell, "154");
                    }
                    other => panic!("expected gold record, got {:?}", other),
                }
            }
            PricedTable::Error { error } => panic!("expected refreshed data, got error: {}", error),
        }

        // the slot now holds the refreshed payload, not the seeded one
        let slot: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("sjc-gold.json")).unwrap(),
        )
        .unwrap();
        assert!(slot["prices"].get("Vàng SJC 1L - Đà Nẵng").is_some());
        assert!(slot["prices"].get("Vàng SJC 1L - Hà Nội").is_none());
        assert_eq!(slot["timestamp"], "29/08/2026 09:00");
    }

    #[tokio::test]
    async fn test_total_failure_without_cache_is_error_value() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(test_config(dir.path(), gold_source(true))).unwrap();

        match pipeline.get_priced_table("sjc-gold").await {
            PricedTable::Error { error } => assert!(!error.is_empty()),
            PricedTable::Data { .. } => panic!("expected an error value"),
        }
    }

    #[tokio::test]
    async fn test_unknown_source_is_error_value() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(test_config(dir.path(), gold_source(false))).unwrap();

        match pipeline.get_priced_table("nope").await {
            PricedTable::Error { error } => assert!(error.contains("nope")),
            PricedTable::Data { .. } => panic!("expected an error value"),
        }
        assert_eq!(
            pipeline.get_headlines("nope").await,
            vec!["Error fetching news: unknown source 'nope'"]
        );
    }

    #[tokio::test]
    async fn test_headline_failure_is_single_error_string() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source {
            id: "dantri-world".to_string(),
            url: DEAD_URL.to_string(),
            kind: SourceKind::HeadlineList,
            schema: SchemaType::Headline,
            numeric: NumericStyle::Display,
            cache: false,
            fallback_query: None,
        };
        let pipeline = Pipeline::new(test_config(dir.path(), source)).unwrap();

        let titles = pipeline.get_headlines("dantri-world").await;
        assert_eq!(titles.len(), 1);
        assert!(titles[0].starts_with("Error fetching news:"));
    }

    #[tokio::test]
    async fn test_search_never_returns_error_strings() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path(), gold_source(false));
        // search template pointing at a dead endpoint
        config.search_url = format!("{}{}", DEAD_URL, "{query}");
        let pipeline = Pipeline::new(config).unwrap();

        assert!(pipeline.search_headlines("giá vàng").await.is_empty());
        assert!(pipeline.search_headlines("   ").await.is_empty());
    }
}
