use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Proxy, StatusCode};
use url::Url;

use crate::config::AppConfig;
use crate::{Error, Result};

const MAX_PAGE_BYTES: usize = 5 * 1024 * 1024;
const MAX_RETRIES: u32 = 3;
const INITIAL_RETRY_DELAY_MS: u64 = 500;

// Rotating User-Agent pool; several blogs reject non-browser clients
static USER_AGENT_INDEX: AtomicUsize = AtomicUsize::new(0);
const USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Chrome on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Firefox on Linux
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
    // Safari on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Get the next User-Agent in rotation
fn next_user_agent() -> &'static str {
    let index = USER_AGENT_INDEX.fetch_add(1, Ordering::Relaxed) % USER_AGENTS.len();
    USER_AGENTS[index]
}

/// Wait before the attempt after `attempt`; none once the last attempt has failed
fn retry_delay(attempt: u32) -> Option<Duration> {
    if attempt + 1 >= MAX_RETRIES {
        return None;
    }
    Some(Duration::from_millis(INITIAL_RETRY_DELAY_MS << attempt))
}

/// Anything that can GET a page or feed and hand back its body
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// reqwest-backed fetcher with timeouts, retry on 429/503 and a size cap
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new fetcher with configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Self::build_client(config.sync.request_timeout_secs, &config.sync.proxy_url)?;
        Ok(Self { client })
    }

    /// Build HTTP client with optional proxy
    fn build_client(timeout_secs: u64, proxy_url: &Option<String>) -> Result<Client> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(ref proxy) = proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for page fetching");
        }

        builder.build().map_err(Error::Http)
    }

    /// Build browser-like headers for a request
    fn build_headers(user_agent: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/rss+xml,application/atom+xml,*/*;q=0.8"
            )
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        if let Ok(ua) = HeaderValue::from_str(user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        headers
    }

    /// Fetch with retry and exponential backoff
    async fn fetch_with_retry(&self, url: &str) -> Result<(StatusCode, Bytes)> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            let user_agent = next_user_agent();
            let headers = Self::build_headers(user_agent);

            tracing::debug!("Fetch attempt {} for {}", attempt + 1, url);

            match self.client.get(url).headers(headers).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE
                    {
                        tracing::warn!("Received {} for {} (attempt {})", status, url, attempt + 1);
                        last_error = Some(Error::Scrape(format!("HTTP {} for URL: {}", status, url)));
                    } else {
                        match response.bytes().await {
                            Ok(bytes) => return Ok((status, bytes)),
                            Err(e) => {
                                tracing::warn!("Failed to read response body: {}", e);
                                last_error = Some(Error::Http(e));
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Request failed for {} (attempt {}): {}", url, attempt + 1, e);
                    last_error = Some(Error::Http(e));
                }
            }

            if let Some(delay) = retry_delay(attempt) {
                tracing::debug!("Retrying {} after {}ms", url, delay.as_millis());
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::Scrape(format!("Failed to fetch URL after {} retries: {}", MAX_RETRIES, url))
        }))
    }

    /// Check if content is a Cloudflare challenge page
    fn is_cloudflare_challenge(content: &[u8]) -> bool {
        let check_len = content.len().min(2048);
        let preview = String::from_utf8_lossy(&content[..check_len]);

        preview.contains("Just a moment...")
            || preview.contains("cf-browser-verification")
            || preview.contains("_cf_chl_opt")
            || preview.contains("challenge-platform")
    }

    fn ensure_content_size(size: usize, url: &str) -> Result<()> {
        if size > MAX_PAGE_BYTES {
            return Err(Error::Scrape(format!("Page too large ({} bytes) for URL: {}", size, url)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        Url::parse(url)?;

        let (status, bytes) = self.fetch_with_retry(url).await?;

        Self::ensure_content_size(bytes.len(), url)?;

        if !status.is_success() {
            return Err(Error::Scrape(format!("HTTP {} for URL: {}", status, url)));
        }

        if Self::is_cloudflare_challenge(&bytes) {
            return Err(Error::Scrape(format!(
                "Cloudflare JavaScript challenge detected for URL: {}. \
                Configure a proxy in [sync] proxy_url or use the site's RSS feed.",
                url
            )));
        }

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_rotation() {
        USER_AGENT_INDEX.store(0, Ordering::Relaxed);

        let ua1 = next_user_agent();
        let ua2 = next_user_agent();
        let ua3 = next_user_agent();

        assert!(ua1.contains("Chrome") && ua1.contains("Windows"));
        assert!(ua2.contains("Chrome") && ua2.contains("Macintosh"));
        assert!(ua3.contains("Firefox") && ua3.contains("Linux"));
    }

    #[test]
    fn test_cloudflare_challenge_detection() {
        assert!(HttpFetcher::is_cloudflare_challenge(
            b"<html><title>Just a moment...</title></html>"
        ));
        assert!(!HttpFetcher::is_cloudflare_challenge(b"<rss><channel></channel></rss>"));
    }

    #[test]
    fn test_content_size_limit() {
        assert!(HttpFetcher::ensure_content_size(1024, "https://a.test").is_ok());
        assert!(HttpFetcher::ensure_content_size(MAX_PAGE_BYTES + 1, "https://a.test").is_err());
    }

    #[tokio::test]
    async fn test_rejects_malformed_url() {
        let fetcher = HttpFetcher::new(&AppConfig::default()).unwrap();
        assert!(matches!(fetcher.fetch("not a url").await, Err(Error::UrlParse(_))));
    }

    #[test]
    fn test_retry_delay_doubles_and_stops_after_last_attempt() {
        assert_eq!(retry_delay(0), Some(Duration::from_millis(500)));
        assert_eq!(retry_delay(1), Some(Duration::from_millis(1000)));
        assert_eq!(retry_delay(MAX_RETRIES - 1), None);
    }

    #[tokio::test]
    async fn test_rate_limited_fetch_gives_up_without_final_wait() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut served = 0;
            while served < MAX_RETRIES {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                socket
                    .write_all(
                        b"HTTP/1.1 429 Too Many Requests\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    )
                    .await
                    .unwrap();
                served += 1;
            }
            served
        });

        let fetcher = HttpFetcher {
            client: Client::builder()
                .no_proxy()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap(),
        };
        let started = std::time::Instant::now();
        let err = fetcher
            .fetch(&format!("http://{}/feed.xml", addr))
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.to_string().contains("429"));
        assert_eq!(server.await.unwrap(), MAX_RETRIES);
        // 500ms + 1000ms between the three attempts, nothing after the last one
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_millis(3000), "took {:?}", elapsed);
    }
}
