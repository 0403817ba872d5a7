use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::FetchError;
use crate::config::FetchConfig;

/// Thin wrapper around `reqwest::Client` carrying the retry policy.
///
/// Every request goes out with a browser-like User-Agent — many of the
/// target pages serve minimal markup (or nothing) to unknown clients.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    config: FetchConfig,
}

impl HttpClient {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { inner, config: config.clone() })
    }

    /// Fetch a URL as text with bounded sequential retry.
    ///
    /// Transport failures and non-2xx statuses retry up to `max_retries`
    /// times after the initial attempt; a 200 with no matching content is
    /// the extractor's problem, never retried here.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.get_text_with_headers(url, &[]).await
    }

    /// Same as [`get_text`](Self::get_text) with per-request extra headers
    /// (the gold API wants Accept/Accept-Language).
    pub async fn get_text_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<String, FetchError> {
        let mut last_err = FetchError::Transport {
            url: url.to_string(),
            message: "no attempts made".to_string(),
        };

        for attempt in 1..=(self.config.max_retries + 1) {
            debug!("GET {} (attempt {})", url, attempt);

            let mut req = self.inner.get(url);
            for (name, value) in headers {
                req = req.header(*name, *value);
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        // The connection can still die mid-body; that is a
                        // transport failure and gets the same retry budget.
                        match resp.text().await {
                            Ok(body) => return Ok(body),
                            Err(e) => {
                                warn!("Body read failed on attempt {}: {}", attempt, e);
                                last_err = FetchError::Transport {
                                    url: url.to_string(),
                                    message: format!("failed to read response body: {}", e),
                                };
                            }
                        }
                    } else {
                        warn!("HTTP {} from {} on attempt {}", status, url, attempt);
                        last_err =
                            FetchError::Status { url: url.to_string(), status: status.as_u16() };
                    }
                }
                Err(e) => {
                    warn!("Request failed on attempt {}: {}", attempt, e);
                    last_err =
                        FetchError::Transport { url: url.to_string(), message: e.to_string() };
                }
            }
        }

        Err(last_err)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    fn test_config() -> FetchConfig {
        FetchConfig {
            timeout_secs: 2,
            max_retries: 3,
            user_agent: "vnfeed-test".to_string(),
        }
    }

    /// Serves `response` to every connection, counting connections, then
    /// drops the socket. `Connection: close` keeps reqwest from pooling, so
    /// the connection count equals the attempt count.
    async fn canned_server(response: &'static [u8], hits: Arc<AtomicUsize>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                hits.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response).await;
            }
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_truncated_body_retries_then_fails() {
        // 200 with a Content-Length longer than the bytes sent: the status
        // arrives fine but the body read dies when the socket closes.
        let hits = Arc::new(AtomicUsize::new(0));
        let url = canned_server(
            b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 4096\r\n\r\nshort",
            Arc::clone(&hits),
        )
        .await;

        let client = HttpClient::new(&test_config()).unwrap();
        let err = client.get_text(&url).await.unwrap_err();

        assert!(matches!(err, FetchError::Transport { .. }), "got {:?}", err);
        // initial attempt + 3 retries
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_server_error_retries_then_reports_status() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = canned_server(
            b"HTTP/1.1 503 Service Unavailable\r\nConnection: close\r\nContent-Length: 0\r\n\r\n",
            Arc::clone(&hits),
        )
        .await;

        let client = HttpClient::new(&test_config()).unwrap();
        let err = client.get_text(&url).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 503, .. }), "got {:?}", err);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_success_uses_single_attempt() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = canned_server(
            b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 2\r\n\r\nok",
            Arc::clone(&hits),
        )
        .await;

        let client = HttpClient::new(&test_config()).unwrap();
        let body = client.get_text(&url).await.unwrap();

        assert_eq!(body, "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
