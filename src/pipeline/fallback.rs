//! Fallback controller for degradable extractions.

use std::future::Future;

use tracing::warn;

use crate::scraper::FetchError;

/// Run `primary`; when it errors or comes back empty, run `secondary` and
/// return its result as-is (which may itself be empty).
///
/// The trigger is the typed result, never the wording of an error message.
/// A primary that yields at least one item short-circuits — `secondary` is
/// not even constructed into a request in that case.
pub async fn resolve<T, P, S>(label: &str, primary: P, secondary: S) -> Result<Vec<T>, FetchError>
where
    P: Future<Output = Result<Vec<T>, FetchError>>,
    S: Future<Output = Result<Vec<T>, FetchError>>,
{
    match primary.await {
        Ok(items) if !items.is_empty() => Ok(items),
        Ok(_) => {
            warn!("{}: primary source returned nothing, trying search fallback", label);
            secondary.await
        }
        Err(e) => {
            warn!("{}: primary source failed ({}), trying search fallback", label, e);
            secondary.await
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
