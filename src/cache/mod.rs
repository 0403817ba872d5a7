//! TTL-backed disk cache, one JSON slot per source.
//!
//! A slot is *fresh* for [`CacheConfig::ttl_secs`] after a write. Past that
//! it reads as [`CacheState::Stale`]: the orchestrator must refresh, but the
//! payload stays available so a failed refresh can degrade to the last good
//! data instead of an error.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::models::{CacheFile, RawPrices};

#[derive(Debug)]
pub enum CacheState {
    /// Entry exists and its age is below the TTL.
    Fresh(CacheFile),
    /// Entry exists but must be refreshed; payload kept for degraded serves.
    Stale(CacheFile),
    Absent,
}

pub struct DiskCache {
    dir: PathBuf,
    ttl_secs: i64,
    /// Serializes file access per source id; whole-file writes must not
    /// interleave under concurrent callers.
    locks: HashMap<String, Mutex<()>>,
}

impl DiskCache {
    pub fn new<I, S>(config: &CacheConfig, source_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let locks = source_ids.into_iter().map(|id| (id.into(), Mutex::new(()))).collect();
        Self { dir: config.dir.clone(), ttl_secs: config.ttl_secs as i64, locks }
    }

    fn slot_path(&self, source_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", source_id))
    }

    fn lock(&self, source_id: &str) -> Option<std::sync::MutexGuard<'_, ()>> {
        self.locks
            .get(source_id)
            .map(|m| m.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    /// Read the slot for a source. The stored `last_updated` stamp is the
    /// TTL clock; an unreadable or unparseable entry counts as absent.
    pub fn read(&self, source_id: &str) -> CacheState {
        let _guard = self.lock(source_id);
        let path = self.slot_path(source_id);

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return CacheState::Absent,
        };
        let file: CacheFile = match serde_json::from_str(&raw) {
            Ok(file) => file,
            Err(e) => {
                warn!("Cache file {:?} is corrupt, ignoring: {}", path, e);
                return CacheState::Absent;
            }
        };

        let age_secs = DateTime::parse_from_rfc3339(&file.last_updated)
            .map(|stored| (Utc::now() - stored.with_timezone(&Utc)).num_seconds());

        match age_secs {
            Ok(age) if age < self.ttl_secs => {
                debug!("Cache hit for {} (age {}s)", source_id, age);
                CacheState::Fresh(file)
            }
            Ok(age) => {
                debug!("Cache for {} expired ({}s old), refresh needed", source_id, age);
                CacheState::Stale(file)
            }
            Err(e) => {
                warn!("Cache for {} has an unreadable timestamp ({}), treating as stale", source_id, e);
                CacheState::Stale(file)
            }
        }
    }

    /// Overwrite the single slot for a source. Whole-file replace: the new
    /// document lands under a temp name and is renamed over the old one.
    pub fn write(&self, source_id: &str, prices: &RawPrices, timestamp: &str) -> Result<()> {
        let _guard = self.lock(source_id);

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Could not create cache dir {:?}", self.dir))?;

        let file = CacheFile {
            prices: prices.clone(),
            timestamp: timestamp.to_string(),
            last_updated: Utc::now().to_rfc3339(),
        };
        let body = serde_json::to_string_pretty(&file).context("Serializing cache entry")?;

        let path = self.slot_path(source_id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).with_context(|| format!("Writing {:?}", tmp))?;
        fs::rename(&tmp, &path).with_context(|| format!("Replacing {:?}", path))?;

        debug!("Cached {} entries for {}", prices.len(), source_id);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
