use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Source definitions ────────────────────────────────────────────────────────

/// How the origin serves its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// HTML page carrying a list of article titles.
    HeadlineList,
    /// HTML page carrying a price table.
    PricedTable,
    /// JSON endpoint with a typed envelope.
    JsonApi,
}

/// Which normalized schema the source's records map into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Headline,
    Fuel,
    Gold,
    Generic,
}

/// Numeric-token cleaning behavior, selectable per source.
///
/// `Display` keeps the original grouping separators ("21.050" stays
/// "21.050"); `Decimal` converts comma-decimals to dot-decimals and strips
/// trailing zeros ("100,500" becomes "100.5").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericStyle {
    #[default]
    Display,
    Decimal,
}

/// One external origin. Immutable after config load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub url: String,
    pub kind: SourceKind,
    pub schema: SchemaType,
    #[serde(default)]
    pub numeric: NumericStyle,
    /// Whether fetch results are cached on disk (gold only for now).
    #[serde(default)]
    pub cache: bool,
    /// Query sent to the search endpoint when the primary page yields nothing.
    #[serde(default)]
    pub fallback_query: Option<String>,
}

// ── Raw extraction output ─────────────────────────────────────────────────────

/// Product name → nested sub-field map, e.g.
/// `{"Xăng RON 95-V": {"Vùng 1": "21.050", "Vùng 2": "21.470"}}`.
///
/// `serde_json::Map` with the `preserve_order` feature keeps keys in
/// first-seen order through the cache round-trip.
pub type RawPrices = serde_json::Map<String, Value>;

/// Sub-field keys used by the gold source.
pub const BUY_KEY: &str = "Mua vào";
pub const SELL_KEY: &str = "Bán ra";

/// Literal key marking a failed extraction inside a raw map.
pub const ERROR_KEY: &str = "error";

// ── Cache document ────────────────────────────────────────────────────────────

/// Persisted cache document, one file per cacheable source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    pub prices: RawPrices,
    /// Source-reported date string (e.g. the gold API's `latestDate`).
    #[serde(default)]
    pub timestamp: String,
    /// RFC 3339 storage time; this is the TTL clock.
    pub last_updated: String,
}

// ── Normalized output ─────────────────────────────────────────────────────────

/// Uniform agent-facing record, shaped by the source's schema type.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum NormalizedRecord {
    Fuel {
        product: String,
        region: String,
        price_display: String,
        unit: String,
        updated_at: String,
        source: String,
    },
    Gold {
        product: String,
        region: String,
        price_buy: String,
        price_sell: String,
        unit: String,
        updated_at: String,
        source: String,
    },
    Generic {
        product: String,
        data: Value,
        updated_at: String,
        source: String,
    },
}

impl NormalizedRecord {
    pub fn region(&self) -> Option<&str> {
        match self {
            NormalizedRecord::Fuel { region, .. } => Some(region),
            NormalizedRecord::Gold { region, .. } => Some(region),
            NormalizedRecord::Generic { .. } => None,
        }
    }
}

/// Envelope returned by the priced-table operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PricedTable {
    Data {
        data: Vec<NormalizedRecord>,
        schema_version: &'static str,
    },
    Error {
        error: String,
    },
}

pub const SCHEMA_VERSION: &str = "1.0";

impl PricedTable {
    pub fn data(records: Vec<NormalizedRecord>) -> Self {
        PricedTable::Data { data: records, schema_version: SCHEMA_VERSION }
    }

    pub fn error(message: impl Into<String>) -> Self {
        PricedTable::Error { error: message.into() }
    }

    /// Keep only records whose region contains `needle`. Errors pass through.
    pub fn retain_region(self, needle: &str) -> Self {
        match self {
            PricedTable::Data { data, schema_version } => PricedTable::Data {
                data: data
                    .into_iter()
                    .filter(|r| r.region().is_some_and(|region| region.contains(needle)))
                    .collect(),
                schema_version,
            },
            err @ PricedTable::Error { .. } => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priced_table_serializes_like_the_wire_contract() {
        let table = PricedTable::data(vec![NormalizedRecord::Fuel {
            product: "Xăng RON 95-V".to_string(),
            region: "Vùng 1".to_string(),
            price_display: "21.050".to_string(),
            unit: "nghìn đồng".to_string(),
            updated_at: "2026-08-28T09:00:00+07:00".to_string(),
            source: "https://webgia.com/gia-xang-dau/petrolimex/".to_string(),
        }]);
        let value = serde_json::to_value(&table).unwrap();
        assert_eq!(value["schema_version"], "1.0");
        assert_eq!(value["data"][0]["product"], "Xăng RON 95-V");

        let err = serde_json::to_value(PricedTable::error("boom")).unwrap();
        assert_eq!(err, json!({"error": "boom"}));
    }

    #[test]
    fn test_retain_region_filters_data_only() {
        let table = PricedTable::data(vec![
            NormalizedRecord::Gold {
                product: "Vàng SJC 1L - Hà Nội".to_string(),
                region: "Hà Nội".to_string(),
                price_buy: "148.3".to_string(),
                price_sell: "150.3".to_string(),
                unit: "nghìn đồng một lượng".to_string(),
                updated_at: String::new(),
                source: String::new(),
            },
            NormalizedRecord::Gold {
                product: "Vàng SJC 1L - Hồ Chí Minh".to_string(),
                region: "Hồ Chí Minh".to_string(),
                price_buy: "148".to_string(),
                price_sell: "150".to_string(),
                unit: "nghìn đồng một lượng".to_string(),
                updated_at: String::new(),
                source: String::new(),
            },
        ]);

        match table.retain_region("Hà Nội") {
            PricedTable::Data { data, .. } => {
                assert_eq!(data.len(), 1);
                assert_eq!(data[0].region(), Some("Hà Nội"));
            }
            other => panic!("expected data, got {:?}", other),
        }

        let err = PricedTable::error("down").retain_region("Hà Nội");
        assert!(matches!(err, PricedTable::Error { .. }));
    }
}
