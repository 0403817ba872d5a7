pub mod cleaner;
pub mod http_client;
pub mod parsers;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use url::Url;

use self::http_client::HttpClient;
use self::parsers::{parse_fuel_table, parse_gold_api, parse_headlines, parse_summary};
use crate::models::{RawPrices, Source, SourceKind};

// ── Error taxonomy ────────────────────────────────────────────────────────────

/// Failure modes of a fetch-and-extract chain.
///
/// `Transport` and `Status` are retried by the HTTP client; `Parse` means
/// the page arrived but no tier matched, which is never retried — it either
/// triggers a configured fallback or surfaces as an error value.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("{0}")]
    Parse(String),
}

// ── Price sources ─────────────────────────────────────────────────────────────

/// Extra headers the SJC price service expects alongside the User-Agent.
const GOLD_API_HEADERS: [(&str, &str); 2] = [
    ("Accept", "application/json, text/plain, */*"),
    ("Accept-Language", "vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7"),
];

/// Swappable priced-source abstraction: fetch one origin and hand back the
/// raw product → fields map plus the source-reported timestamp, if any.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn source(&self) -> &Source;
    async fn fetch_raw(&self) -> Result<(RawPrices, Option<String>), FetchError>;
}

/// Petrolimex fuel prices scraped from the webgia HTML table.
pub struct WebgiaFuelScraper {
    client: HttpClient,
    source: Source,
}

impl WebgiaFuelScraper {
    pub fn new(client: HttpClient, source: Source) -> Self {
        Self { client, source }
    }
}

#[async_trait]
impl PriceSource for WebgiaFuelScraper {
    fn source(&self) -> &Source {
        &self.source
    }

    async fn fetch_raw(&self) -> Result<(RawPrices, Option<String>), FetchError> {
        debug!("Fetching webgia fuel page: {}", self.source.url);
        let html = self.client.get_text(&self.source.url).await?;
        let prices = parse_fuel_table(&html)?;
        debug!("Parsed {} fuel entries", prices.len());
        Ok((prices, None))
    }
}

/// SJC gold prices from the JSON price service.
pub struct SjcGoldScraper {
    client: HttpClient,
    source: Source,
}

impl SjcGoldScraper {
    pub fn new(client: HttpClient, source: Source) -> Self {
        Self { client, source }
    }
}

#[async_trait]
impl PriceSource for SjcGoldScraper {
    fn source(&self) -> &Source {
        &self.source
    }

    async fn fetch_raw(&self) -> Result<(RawPrices, Option<String>), FetchError> {
        debug!("Fetching SJC gold prices from API: {}", self.source.url);
        let body =
            self.client.get_text_with_headers(&self.source.url, &GOLD_API_HEADERS).await?;
        let (prices, latest_date) = parse_gold_api(&body, self.source.numeric)?;
        debug!("Parsed {} gold entries", prices.len());
        Ok((prices, Some(latest_date)))
    }
}

/// Build the scraper matching a source's kind, or `None` for non-priced kinds.
pub fn price_source_for(client: &HttpClient, source: &Source) -> Option<Box<dyn PriceSource>> {
    match source.kind {
        SourceKind::PricedTable => {
            Some(Box::new(WebgiaFuelScraper::new(client.clone(), source.clone())))
        }
        SourceKind::JsonApi => {
            Some(Box::new(SjcGoldScraper::new(client.clone(), source.clone())))
        }
        SourceKind::HeadlineList => None,
    }
}

// ── News pages ────────────────────────────────────────────────────────────────

/// Headline and article-text scraping over the Dantri pages.
pub struct NewsScraper {
    client: HttpClient,
}

impl NewsScraper {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Up to 5 unique headlines from a category (or search-result) page.
    pub async fn fetch_headlines(&self, url: &str) -> Result<Vec<String>, FetchError> {
        debug!("Fetching headlines from {}", url);
        let html = self.client.get_text(url).await?;
        Ok(parse_headlines(&html))
    }

    /// Plain-text article summary, capped at 200 words.
    pub async fn fetch_summary(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching article for summary: {}", url);
        let html = self.client.get_text(url).await?;
        Ok(parse_summary(&html))
    }
}

/// Substitute a percent-encoded query into a search URL template.
///
/// The template carries a literal `{query}` placeholder, e.g.
/// `https://dantri.com.vn/tim-kiem/{query}.htm`.
pub fn build_search_url(template: &str, query: &str) -> Result<String, FetchError> {
    // The placeholder sits in a path segment, where "+" is a literal plus,
    // not a space. byte_serialize emits form-style "+"; map it to %20. A
    // literal "+" in the query is already "%2B" at this point.
    let encoded: String = url::form_urlencoded::byte_serialize(query.trim().as_bytes())
        .collect::<String>()
        .replace('+', "%20");
    let candidate = template.replace("{query}", &encoded);
    // reject templates that produce something unfetchable
    Url::parse(&candidate)
        .map_err(|e| FetchError::Parse(format!("Invalid search URL {}: {}", candidate, e)))?;
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_search_url_encodes_query() {
        let url =
            build_search_url("https://dantri.com.vn/tim-kiem/{query}.htm", "giá vàng").unwrap();
        // spaces become %20, never the form-style "+"
        assert_eq!(url, "https://dantri.com.vn/tim-kiem/gi%C3%A1%20v%C3%A0ng.htm");
    }

    #[test]
    fn test_build_search_url_keeps_literal_plus_distinct() {
        let url = build_search_url("https://dantri.com.vn/tim-kiem/{query}.htm", "c++").unwrap();
        assert_eq!(url, "https://dantri.com.vn/tim-kiem/c%2B%2B.htm");
    }

    #[test]
    fn test_build_search_url_rejects_garbage_template() {
        assert!(build_search_url("not a url {query}", "x").is_err());
    }
}
