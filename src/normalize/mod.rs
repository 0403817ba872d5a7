//! Schema normalizer: raw product → field maps into uniform records.

use chrono::{FixedOffset, Utc};
use serde_json::Value;

use crate::models::{BUY_KEY, ERROR_KEY, NormalizedRecord, RawPrices, SELL_KEY, SchemaType};

const FUEL_UNIT: &str = "nghìn đồng";
const GOLD_UNIT: &str = "nghìn đồng một lượng";
/// Region used when a gold product name carries no branch segment.
const DEFAULT_GOLD_REGION: &str = "Miền Bắc";

/// All sources report Vietnam local time.
const VN_UTC_OFFSET_SECS: i32 = 7 * 3600;

/// Normalization-time stamp, fixed-offset ISO 8601. Computed fresh on every
/// call — it marks when the records were produced, not when they were fetched.
pub fn now_stamp() -> String {
    let offset = FixedOffset::east_opt(VN_UTC_OFFSET_SECS).expect("+07:00 is in range");
    Utc::now().with_timezone(&offset).to_rfc3339()
}

/// Map a raw price table into schema-shaped records.
///
/// Items keyed by the literal failure marker are skipped. Fuel sources fan
/// out one record per (product, region) pair; gold sources derive the region
/// from the product name's last " - " segment; everything else passes the
/// nested data through untouched.
pub fn normalize_records(
    raw: &RawPrices,
    source_url: &str,
    schema: SchemaType,
) -> Vec<NormalizedRecord> {
    let ts = now_stamp();
    let mut out = Vec::new();

    for (product, data) in raw {
        if product.as_str() == ERROR_KEY {
            continue;
        }

        match schema {
            SchemaType::Fuel => {
                let Some(fields) = data.as_object() else { continue };
                for (region, value) in fields {
                    out.push(NormalizedRecord::Fuel {
                        product: product.clone(),
                        region: region.clone(),
                        price_display: value_str(value),
                        unit: FUEL_UNIT.to_string(),
                        updated_at: ts.clone(),
                        source: source_url.to_string(),
                    });
                }
            }
            SchemaType::Gold => {
                let region = derive_gold_region(product);
                out.push(NormalizedRecord::Gold {
                    product: product.clone(),
                    region,
                    price_buy: field_str(data, BUY_KEY),
                    price_sell: field_str(data, SELL_KEY),
                    unit: GOLD_UNIT.to_string(),
                    updated_at: ts.clone(),
                    source: source_url.to_string(),
                });
            }
            SchemaType::Headline | SchemaType::Generic => {
                out.push(NormalizedRecord::Generic {
                    product: product.clone(),
                    data: data.clone(),
                    updated_at: ts.clone(),
                    source: source_url.to_string(),
                });
            }
        }
    }

    out
}

/// Gold product names read "TypeName - BranchName"; the branch is the region.
fn derive_gold_region(product: &str) -> String {
    let parts: Vec<&str> = product.split(" - ").collect();
    if parts.len() >= 2 {
        parts[parts.len() - 1].to_string()
    } else {
        DEFAULT_GOLD_REGION.to_string()
    }
}

fn field_str(data: &Value, key: &str) -> String {
    data.get(key).map(value_str).unwrap_or_default()
}

fn value_str(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
