//! Source-specific extraction strategies.
//!
//! All of these are pure functions over already-fetched content — no I/O.
//! Each one signals "structure not found" with [`FetchError::Parse`] so the
//! orchestrator can decide whether a fallback applies.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::{Value, json};

use super::FetchError;
use super::cleaner::{clean_decimal, clean_display, dedup_cap, strip_tags, unescape_entities};
use crate::models::{BUY_KEY, NumericStyle, RawPrices, SELL_KEY};

// ── Headlines ─────────────────────────────────────────────────────────────────

/// At most this many headlines per extraction.
pub const HEADLINE_CAP: usize = 5;

/// Dantri article titles sit in `<h3 class="article-title"><a ...>Title</a></h3>`.
static ARTICLE_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<h3 class="article-title">.*?<a[^>]*>(.*?)</a>"#)
        .expect("article title regex")
});

/// Extract up to [`HEADLINE_CAP`] unique headlines in page order.
pub fn parse_headlines(html: &str) -> Vec<String> {
    let titles = ARTICLE_TITLE
        .captures_iter(html)
        .map(|caps| unescape_entities(&strip_tags(&caps[1])));
    dedup_cap(titles, HEADLINE_CAP)
}

// ── Article summary ───────────────────────────────────────────────────────────

pub const SUMMARY_WORD_LIMIT: usize = 200;

static PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<p[^>]*>(.*?)</p>").expect("paragraph regex"));

/// First 200 words of the article's paragraph text, with a "..." marker
/// iff the source had more.
pub fn parse_summary(html: &str) -> String {
    let paragraphs: Vec<String> =
        PARAGRAPH.captures_iter(html).map(|caps| strip_tags(&caps[1])).collect();
    let full_text = paragraphs.join(" ");
    let words: Vec<&str> = full_text.split_whitespace().collect();

    if words.len() > SUMMARY_WORD_LIMIT {
        format!("{}...", words[..SUMMARY_WORD_LIMIT].join(" "))
    } else {
        words.join(" ")
    }
}

// ── Fuel price table (tiered) ─────────────────────────────────────────────────

const PRODUCT_HEADER: &str = "Sản phẩm";
const REGION_1: &str = "Vùng 1";
const REGION_2: &str = "Vùng 2";
/// Tokens that mark a row as belonging to the fuel product domain.
const DOMAIN_TOKENS: [&str; 3] = ["Xăng", "DO", "Dầu"];
/// Lines matching this are unit headers, not products.
const UNITS_MARKER: &str = "đơn vị";

static TABLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("table selector"));
static TR_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("tr selector"));
static CELL_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td, th").expect("cell selector"));

/// Product-then-two-numbers free-text line, e.g. "Xăng RON 95-V 21.050 21.470".
static PRICE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<prod>[A-Za-zÀ-ỹ0-9\-\s/().]{3,80}?)\s+(\d{1,3}(?:[.,]\d{3})*(?:[.,]\d+)?)\s+(\d{1,3}(?:[.,]\d{3})*(?:[.,]\d+)?)",
    )
    .expect("price line regex")
});

/// Extract the fuel price table with three fallback tiers:
///
/// 1. tables whose text carries both header tokens ("Sản phẩm", "Vùng 1");
/// 2. tables carrying "Vùng 1" together with any product-domain token;
/// 3. free-text lines matching `<product> <number> <number>`.
///
/// The first tier that yields any entries wins; all three empty is a
/// [`FetchError::Parse`].
pub fn parse_fuel_table(html: &str) -> Result<RawPrices, FetchError> {
    let doc = Html::parse_document(html);

    let tier1: Vec<ElementRef> = doc
        .select(&TABLE_SEL)
        .filter(|t| {
            let text = flat_text(t);
            text.contains(PRODUCT_HEADER) && text.contains(REGION_1)
        })
        .collect();

    let candidates = if tier1.is_empty() {
        doc.select(&TABLE_SEL)
            .filter(|t| {
                let text = flat_text(t);
                text.contains(REGION_1) && DOMAIN_TOKENS.iter().any(|tok| text.contains(tok))
            })
            .collect()
    } else {
        tier1
    };

    for table in &candidates {
        let prices = parse_table_rows(table);
        if !prices.is_empty() {
            return Ok(prices);
        }
    }

    let prices = parse_text_lines(&doc);
    if prices.is_empty() {
        return Err(FetchError::Parse(
            "No prices found on webgia page (structure may have changed).".to_string(),
        ));
    }
    Ok(prices)
}

fn parse_table_rows(table: &ElementRef) -> RawPrices {
    let mut prices = RawPrices::new();

    for tr in table.select(&TR_SEL) {
        let cells: Vec<String> = tr.select(&CELL_SEL).map(|c| flat_text(&c)).collect();
        if cells.is_empty() {
            continue;
        }

        let product = cells[0].trim().to_string();
        if product.is_empty() {
            continue;
        }
        // Header rows carry one of the header tokens in their first cell.
        let lower = product.to_lowercase();
        if lower.contains("sản phẩm") || lower.contains("vùng 1") {
            continue;
        }

        let v1 = cells.get(1).map(|s| clean_display(s)).unwrap_or_default();
        let v2 = cells.get(2).map(|s| clean_display(s)).unwrap_or_default();
        prices.insert(product, json!({ REGION_1: v1, REGION_2: v2 }));
    }

    prices
}

fn parse_text_lines(doc: &Html) -> RawPrices {
    let text: String = doc
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let mut prices = RawPrices::new();
    for line in text.lines() {
        let Some(caps) = PRICE_LINE.captures(line) else { continue };
        let product = caps["prod"].trim().to_string();
        if product.to_lowercase().contains(UNITS_MARKER) {
            continue;
        }
        if !DOMAIN_TOKENS.iter().any(|tok| product.contains(tok)) {
            continue;
        }
        let v1 = clean_display(&caps[2]);
        let v2 = clean_display(&caps[3]);
        prices.insert(product, json!({ REGION_1: v1, REGION_2: v2 }));
    }
    prices
}

/// Element text with each node trimmed, joined by single spaces.
fn flat_text(el: &ElementRef) -> String {
    el.text().map(str::trim).filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" ")
}

// ── Gold price API ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GoldEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<GoldItem>,
    #[serde(default, rename = "latestDate")]
    latest_date: String,
}

#[derive(Debug, Deserialize)]
struct GoldItem {
    #[serde(default, rename = "TypeName")]
    type_name: String,
    #[serde(default, rename = "BranchName")]
    branch_name: String,
    #[serde(default, rename = "Buy")]
    buy: Value,
    #[serde(default, rename = "Sell")]
    sell: Value,
}

/// Map the SJC price-service envelope into a raw price table.
///
/// Items missing any of type name, branch name, buy or sell are skipped,
/// not fatal. Returns the table plus the API's `latestDate` string.
pub fn parse_gold_api(
    body: &str,
    numeric: NumericStyle,
) -> Result<(RawPrices, String), FetchError> {
    let envelope: GoldEnvelope = serde_json::from_str(body).map_err(|e| {
        FetchError::Parse(format!("Error parsing JSON response from SJC API: {}", e))
    })?;

    if !envelope.success {
        return Err(FetchError::Parse("API returned success=false".to_string()));
    }

    let clean: fn(&str) -> String = match numeric {
        NumericStyle::Display => clean_display,
        NumericStyle::Decimal => clean_decimal,
    };

    let mut prices = RawPrices::new();
    for item in &envelope.data {
        let buy = value_text(&item.buy);
        let sell = value_text(&item.sell);
        if item.type_name.is_empty() || item.branch_name.is_empty() || buy.is_empty() || sell.is_empty()
        {
            continue;
        }
        let product = format!("{} - {}", item.type_name, item.branch_name);
        prices.insert(product, json!({ BUY_KEY: clean(&buy), SELL_KEY: clean(&sell) }));
    }

    if prices.is_empty() {
        return Err(FetchError::Parse("No gold prices found in SJC API response.".to_string()));
    }

    Ok((prices, envelope.latest_date))
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
