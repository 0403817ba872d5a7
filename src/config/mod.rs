use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::{NumericStyle, SchemaType, Source, SourceKind};

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Search endpoint template with a literal `{query}` placeholder.
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Immutable source table, defined at startup.
    #[serde(default = "default_sources")]
    pub sources: Vec<Source>,
}

/// Fetch client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the initial attempt; transport and status failures only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Disk cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_timeout_secs() -> u64 {
    12
}
fn default_max_retries() -> u32 {
    3
}
fn default_user_agent() -> String {
    // Browser-like identity; several of the target pages serve minimal
    // markup to anything that does not look like a browser.
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0 Safari/537.36"
        .to_string()
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/cache")
}
fn default_ttl_secs() -> u64 {
    3600
}
fn default_search_url() -> String {
    "https://dantri.com.vn/tim-kiem/{query}.htm".to_string()
}

fn default_sources() -> Vec<Source> {
    vec![
        Source {
            id: "dantri-world".to_string(),
            url: "https://dantri.com.vn/the-gioi.htm".to_string(),
            kind: SourceKind::HeadlineList,
            schema: SchemaType::Headline,
            numeric: NumericStyle::Display,
            cache: false,
            fallback_query: Some("thế giới".to_string()),
        },
        Source {
            id: "dantri-vietnam".to_string(),
            url: "https://dantri.com.vn/thoi-su.htm".to_string(),
            kind: SourceKind::HeadlineList,
            schema: SchemaType::Headline,
            numeric: NumericStyle::Display,
            cache: false,
            fallback_query: Some("thời sự".to_string()),
        },
        Source {
            id: "webgia-fuel".to_string(),
            url: "https://webgia.com/gia-xang-dau/petrolimex/".to_string(),
            kind: SourceKind::PricedTable,
            schema: SchemaType::Fuel,
            numeric: NumericStyle::Display,
            cache: false,
            fallback_query: None,
        },
        Source {
            id: "sjc-gold".to_string(),
            url: "https://sjc.com.vn/GoldPrice/Services/PriceService.ashx".to_string(),
            kind: SourceKind::JsonApi,
            schema: SchemaType::Gold,
            numeric: NumericStyle::Decimal,
            cache: true,
            fallback_query: None,
        },
    ]
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("VNFEED").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            cache: CacheConfig::default(),
            search_url: default_search_url(),
            sources: default_sources(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { dir: default_cache_dir(), ttl_secs: default_ttl_secs() }
    }
}
