//! Rate-limited, retrying HTTP transport and PDF fetch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{
    CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DOCUMENT_TIMEOUT, MIRROR_TIMEOUT, PDF_MAGIC,
    PUBLISHER_TIMEOUT,
};
use super::error::DownloadError;
use super::rate_limiter::{RateLimiter, parse_retry_after};
use super::retry::{FailureType, RetryDecision, RetryPolicy};
use crate::user_agent;

/// What a request is for; selects its timeout and User-Agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Metadata and index APIs (configured timeout, tool UA).
    Api,
    /// DOI landing pages (20s, browser UA).
    Publisher,
    /// Mirror pages (10s, browser UA).
    Mirror,
    /// PDF downloads (60s, browser UA).
    Document,
}

impl RequestKind {
    fn timeout(self, general: Duration) -> Duration {
        match self {
            Self::Api => general,
            Self::Publisher => PUBLISHER_TIMEOUT,
            Self::Mirror => MIRROR_TIMEOUT,
            Self::Document => DOCUMENT_TIMEOUT,
        }
    }

    fn browser_ua(self) -> bool {
        !matches!(self, Self::Api)
    }
}

/// Transport settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Timeout for [`RequestKind::Api`] requests.
    pub timeout: Duration,
    /// Retry budget and backoff.
    pub retry: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Shared HTTP transport.
///
/// Every request, whichever component issues it, goes through
/// [`RateLimiter::acquire`] once per attempt and through the bounded retry
/// loop. Designed to be created once, wrapped in `Arc`, and shared.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use refcrawler_core::download::{HttpClient, RateLimiter, RequestKind, TransportConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = Arc::new(RateLimiter::from_rps(2.0));
/// let client = HttpClient::new(TransportConfig::default(), limiter)?;
/// let response = client.get("https://api.crossref.org/works/10.1000/x", RequestKind::Api).await?;
/// println!("status: {}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    limiter: Arc<RateLimiter>,
    config: TransportConfig,
}

impl HttpClient {
    /// Creates a transport sharing `limiter`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if reqwest cannot build a client
    /// (e.g. TLS backend initialization failure).
    pub fn new(config: TransportConfig, limiter: Arc<RateLimiter>) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .gzip(true)
            .user_agent(user_agent::default_api_user_agent())
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;
        Ok(Self {
            client,
            limiter,
            config,
        })
    }

    /// Returns the shared rate limiter.
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Returns the transport configuration.
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Sends a GET request.
    ///
    /// Redirects are followed; `response.url()` is the final URL.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] if `url` does not parse
    /// - [`DownloadError::Network`] / [`DownloadError::Timeout`] once
    ///   connection-level failures exhaust the retry budget
    /// - [`DownloadError::HttpStatus`] once a retryable status exhausts it
    ///
    /// Non-retryable error statuses (404, 403, ...) are returned as `Ok` for
    /// the caller to inspect.
    pub async fn get(
        &self,
        url: &str,
        kind: RequestKind,
    ) -> Result<reqwest::Response, DownloadError> {
        self.get_with_query(url, &[], kind).await
    }

    /// Sends a GET request with query parameters.
    ///
    /// # Errors
    ///
    /// Same as [`HttpClient::get`].
    #[instrument(skip(self, query), fields(url = %url, kind = ?kind))]
    pub async fn get_with_query(
        &self,
        url: &str,
        query: &[(&str, String)],
        kind: RequestKind,
    ) -> Result<reqwest::Response, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let mut attempt: u32 = 1;
        loop {
            self.limiter.acquire().await;

            let mut request = self
                .client
                .get(url)
                .timeout(kind.timeout(self.config.timeout));
            if !query.is_empty() {
                request = request.query(query);
            }
            if kind.browser_ua() {
                request = request.header(USER_AGENT, user_agent::BROWSER_USER_AGENT);
            }

            let error = match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if response.status().is_success()
                        || !self.config.retry.is_retryable_status(status)
                    {
                        debug!(status, attempt, "response received");
                        return Ok(response);
                    }
                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .map(std::string::ToString::to_string);
                    DownloadError::http_status_with_retry_after(url, status, retry_after)
                }
                Err(e) => DownloadError::from_send(url, e),
            };

            let failure = self.config.retry.classify(&error);
            match self.config.retry.should_retry(failure, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    let delay = server_delay(&error, failure).map_or(delay, |d| d.max(delay));
                    debug!(
                        error = %error,
                        delay_ms = delay.as_millis(),
                        next_attempt = next,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(error = %error, reason = %reason, "giving up");
                    return Err(error);
                }
            }
        }
    }

    /// Downloads a PDF from `url` into `path`.
    ///
    /// The response is accepted when its `Content-Type` mentions `pdf` or
    /// its body starts with `%PDF`. Otherwise nothing is written and
    /// [`DownloadError::NotDocument`] is returned. Parent directories are
    /// created as needed; an existing file at `path` is replaced. A partially
    /// written file is removed if the body stream fails.
    ///
    /// # Errors
    ///
    /// Transport errors from [`HttpClient::get`], [`DownloadError::HttpStatus`]
    /// for non-success responses, [`DownloadError::NotDocument`], and
    /// [`DownloadError::Io`] for filesystem failures.
    #[instrument(skip(self, path), fields(url = %url, path = %path.display()))]
    pub async fn fetch_document(&self, url: &str, path: &Path) -> Result<PathBuf, DownloadError> {
        let response = self.get(url, RequestKind::Document).await?;
        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);
        let labelled_pdf = content_type.as_deref().is_some_and(|ct| ct.contains("pdf"));

        let mut stream = response.bytes_stream();
        let mut head: Vec<u8> = Vec::new();
        while head.len() < PDF_MAGIC.len() {
            match stream.next().await {
                Some(chunk) => {
                    let chunk = chunk.map_err(|e| DownloadError::network(url, e))?;
                    head.extend_from_slice(&chunk);
                }
                None => break,
            }
        }

        if !labelled_pdf && !head.starts_with(PDF_MAGIC) {
            debug!(content_type = ?content_type, "response is not a PDF, discarding");
            return Err(DownloadError::not_document(url, content_type.as_deref()));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }
        let mut file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;

        match stream_to_file(&mut file, &head, stream, url, path).await {
            Ok(bytes) => {
                info!(bytes, "document saved");
                Ok(path.to_path_buf())
            }
            Err(e) => {
                debug!(path = %path.display(), "cleaning up partial file after error");
                if let Err(remove_err) = tokio::fs::remove_file(path).await {
                    warn!(error = %remove_err, "failed to remove partial file");
                }
                Err(e)
            }
        }
    }
}

/// Server-mandated delay from a Retry-After header on 429/503 responses.
fn server_delay(error: &DownloadError, failure: FailureType) -> Option<Duration> {
    let DownloadError::HttpStatus {
        status,
        retry_after: Some(value),
        ..
    } = error
    else {
        return None;
    };
    if failure == FailureType::RateLimited || *status == 503 {
        parse_retry_after(value)
    } else {
        None
    }
}

/// Writes the already-read `head` and the rest of the body, returning bytes written.
async fn stream_to_file<S, B>(
    file: &mut File,
    head: &[u8],
    mut stream: S,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError>
where
    S: futures_util::Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    let mut writer = BufWriter::new(file);
    writer
        .write_all(head)
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;
    let mut bytes_written = head.len() as u64;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;
        let chunk = chunk.as_ref();
        writer
            .write_all(chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn client_with(retries: u32) -> HttpClient {
        let config = TransportConfig {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::new(retries, 0.0),
        };
        HttpClient::new(config, Arc::new(RateLimiter::disabled())).unwrap()
    }

    // ==================== Transport Tests ====================

    #[test]
    fn test_request_kind_timeouts() {
        let general = Duration::from_secs(7);
        assert_eq!(RequestKind::Api.timeout(general), general);
        assert_eq!(RequestKind::Publisher.timeout(general), Duration::from_secs(20));
        assert_eq!(RequestKind::Mirror.timeout(general), Duration::from_secs(10));
        assert_eq!(RequestKind::Document.timeout(general), Duration::from_secs(60));
    }

    #[test]
    fn test_get_invalid_url() {
        let client = client_with(0);
        let result = tokio_test::block_on(client.get("not-a-valid-url", RequestKind::Api));
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_get_retries_transient_status_then_succeeds() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .expect(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_with(3);
        let url = format!("{}/flaky", mock_server.uri());
        let response = client.get(&url, RequestKind::Api).await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn test_get_exhausts_retry_budget() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        // initial attempt + 2 retries
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&mock_server)
            .await;

        let client = client_with(2);
        let url = format!("{}/down", mock_server.uri());
        match client.get(&url, RequestKind::Api).await {
            Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 502),
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_non_retryable_status_returned_once() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_with(3);
        let url = format!("{}/missing", mock_server.uri());
        let response = client.get(&url, RequestKind::Api).await.unwrap();
        assert_eq!(response.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_page_requests_send_browser_user_agent() {
        use wiremock::{Match, Request};

        /// Matches requests whose User-Agent contains "Chrome".
        struct BrowserUaMatcher;

        impl Match for BrowserUaMatcher {
            fn matches(&self, request: &Request) -> bool {
                request
                    .headers
                    .get("User-Agent")
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|ua| ua.contains("Chrome"))
            }
        }

        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/landing"))
            .and(BrowserUaMatcher)
            .respond_with(ResponseTemplate::new(200))
            .with_priority(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/landing"))
            .respond_with(ResponseTemplate::new(403))
            .with_priority(u8::MAX)
            .mount(&mock_server)
            .await;

        let client = client_with(0);
        let url = format!("{}/landing", mock_server.uri());

        let page = client.get(&url, RequestKind::Publisher).await.unwrap();
        assert_eq!(page.status().as_u16(), 200);

        let api = client.get(&url, RequestKind::Api).await.unwrap();
        assert_eq!(api.status().as_u16(), 403);
    }

    // ==================== fetch_document Tests ====================

    #[tokio::test]
    async fn test_fetch_document_by_content_type() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/paper"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/pdf")
                    .set_body_bytes(b"binary body"),
            )
            .mount(&mock_server)
            .await;

        let client = client_with(0);
        let url = format!("{}/paper", mock_server.uri());
        let target = temp_dir.path().join("main").join("Paper.pdf");
        let saved = client.fetch_document(&url, &target).await.unwrap();

        assert_eq!(saved, target);
        assert_eq!(std::fs::read(&saved).unwrap(), b"binary body");
    }

    #[tokio::test]
    async fn test_fetch_document_by_magic_bytes() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/octet"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/octet-stream")
                    .set_body_bytes(b"%PDF-1.7 rest of file"),
            )
            .mount(&mock_server)
            .await;

        let client = client_with(0);
        let url = format!("{}/octet", mock_server.uri());
        let target = temp_dir.path().join("x.pdf");
        client.fetch_document(&url, &target).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.7 rest of file");
    }

    #[tokio::test]
    async fn test_fetch_document_rejects_html_without_writing() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/captcha"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/html")
                    .set_body_string("<html>please verify you are human</html>"),
            )
            .mount(&mock_server)
            .await;

        let client = client_with(0);
        let url = format!("{}/captcha", mock_server.uri());
        let target = temp_dir.path().join("sub").join("x.pdf");
        let result = client.fetch_document(&url, &target).await;

        assert!(matches!(result, Err(DownloadError::NotDocument { .. })));
        assert!(!target.exists());
        assert!(!target.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_fetch_document_http_error() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&mock_server)
            .await;

        let client = client_with(0);
        let url = format!("{}/gone", mock_server.uri());
        let target = temp_dir.path().join("x.pdf");
        match client.fetch_document(&url, &target).await {
            Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 410),
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
        assert!(!target.exists());
    }
}
