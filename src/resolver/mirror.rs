//! Operator-supplied mirror fallback.
//!
//! There are no built-in mirror hosts. An empty list is a configuration
//! error, reported on every attempt so it shows up in the resolution log.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use super::utils::{absolutize_url, compile_static_selector};
use super::{ResolutionStrategy, ResolveError, StrategyStep};
use crate::download::{HttpClient, RequestKind};
use crate::parser::Doi;

const NAME: &str = "mirror";

static EMBED_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("iframe[src], embed[src]"));

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("a[href]"));

/// Extracts the embedded document URL from a mirror page.
///
/// An `iframe`/`embed` whose `src` mentions `pdf` wins; otherwise the first
/// anchor whose `href` mentions `pdf`.
#[must_use]
pub fn find_embedded_document(html: &str, page: &Url) -> Option<Url> {
    let document = Html::parse_document(html);
    let mentions_pdf = |value: &&str| value.to_ascii_lowercase().contains("pdf");

    document
        .select(&EMBED_SELECTOR)
        .filter_map(|el| el.value().attr("src"))
        .filter(mentions_pdf)
        .find_map(|src| absolutize_url(src, page))
        .or_else(|| {
            document
                .select(&ANCHOR_SELECTOR)
                .filter_map(|el| el.value().attr("href"))
                .filter(mentions_pdf)
                .find_map(|href| absolutize_url(href, page))
        })
}

/// Tries each configured mirror in order.
pub struct MirrorStrategy {
    client: Arc<HttpClient>,
    mirrors: Vec<String>,
}

impl MirrorStrategy {
    /// Creates a strategy over `mirrors`, tried in the given order.
    #[must_use]
    pub fn new(client: Arc<HttpClient>, mirrors: Vec<String>) -> Self {
        let mirrors = mirrors
            .into_iter()
            .map(|m| m.trim().trim_end_matches('/').to_string())
            .filter(|m| !m.is_empty())
            .collect();
        Self { client, mirrors }
    }

    /// Returns the normalized mirror list.
    #[must_use]
    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }
}

impl std::fmt::Debug for MirrorStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorStrategy")
            .field("mirrors", &self.mirrors)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ResolutionStrategy for MirrorStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(skip(self), fields(strategy = NAME, doi = %doi, mirrors = self.mirrors.len()))]
    async fn attempt(&self, doi: &Doi) -> Result<StrategyStep, ResolveError> {
        if self.mirrors.is_empty() {
            return Err(ResolveError::configuration(
                NAME,
                "no mirror base URLs configured",
                "Pass --mirrors <url,...> or set `mirrors` in the config file",
            ));
        }

        let mut last_reason = String::new();
        for mirror in &self.mirrors {
            let page = format!("{mirror}/{doi}");
            let response = match self.client.get(&page, RequestKind::Mirror).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(mirror = %mirror, error = %e, "mirror unreachable");
                    last_reason = format!("{mirror}: {e}");
                    continue;
                }
            };

            if response.status().as_u16() != 200 {
                debug!(mirror = %mirror, status = response.status().as_u16(), "mirror has no copy");
                last_reason = format!("{mirror}: HTTP {}", response.status().as_u16());
                continue;
            }

            let page_url = response.url().clone();
            let html = match response.text().await {
                Ok(html) => html,
                Err(e) => {
                    warn!(mirror = %mirror, error = %e, "mirror body unreadable");
                    last_reason = format!("{mirror}: {e}");
                    continue;
                }
            };

            if let Some(url) = find_embedded_document(&html, &page_url) {
                debug!(mirror = %mirror, document = %url, "embedded document found");
                return Ok(StrategyStep::Found(url));
            }
            debug!(mirror = %mirror, "no embedded document; using mirror page");
            return Ok(StrategyStep::Found(page_url));
        }

        Ok(StrategyStep::NotFound(format!(
            "no mirror served the identifier (last: {last_reason})"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::{RateLimiter, RetryPolicy, TransportConfig};
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn client() -> Arc<HttpClient> {
        let config = TransportConfig {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::new(0, 0.0),
        };
        Arc::new(HttpClient::new(config, Arc::new(RateLimiter::disabled())).unwrap())
    }

    fn page() -> Url {
        Url::parse("https://mirror.example/10.1/x").unwrap()
    }

    // ==================== Embedded Document Tests ====================

    #[test]
    fn test_embedded_iframe_protocol_relative() {
        let html = r#"<iframe src="//cdn.mirror.example/store/x.pdf#view=FitH"></iframe>
                      <a href="/other.pdf">alt</a>"#;
        let url = find_embedded_document(html, &page()).unwrap();
        assert_eq!(url.as_str(), "https://cdn.mirror.example/store/x.pdf#view=FitH");
    }

    #[test]
    fn test_embedded_embed_tag() {
        let html = r#"<embed type="application/pdf" src="/files/x.PDF">"#;
        let url = find_embedded_document(html, &page()).unwrap();
        assert_eq!(url.as_str(), "https://mirror.example/files/x.PDF");
    }

    #[test]
    fn test_embedded_falls_back_to_anchor() {
        let html = r#"<iframe src="/ads/banner.html"></iframe>
                      <a href="/about">about</a><a href="/dl/x.pdf">save</a>"#;
        let url = find_embedded_document(html, &page()).unwrap();
        assert_eq!(url.as_str(), "https://mirror.example/dl/x.pdf");
    }

    #[test]
    fn test_embedded_none() {
        assert!(find_embedded_document("<p>nothing</p>", &page()).is_none());
    }

    // ==================== Strategy Tests ====================

    #[tokio::test]
    async fn test_empty_mirror_list_is_configuration_error() {
        let strategy = MirrorStrategy::new(client(), vec![" ".to_string()]);
        assert!(strategy.mirrors().is_empty());
        let err = strategy
            .attempt(&Doi::parse("10.1/x").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_second_mirror_used_after_first_misses() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/m1/10.1/x"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/m2/10.1/x"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"<iframe src="/files/x.pdf"></iframe>"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let mirrors = vec![
            format!("{}/m1", mock_server.uri()),
            format!("{}/m2/", mock_server.uri()),
        ];
        let strategy = MirrorStrategy::new(client(), mirrors);
        let step = strategy
            .attempt(&Doi::parse("10.1/x").unwrap())
            .await
            .unwrap();
        let StrategyStep::Found(url) = step else {
            panic!("expected Found");
        };
        assert_eq!(url.as_str(), format!("{}/files/x.pdf", mock_server.uri()));
    }

    #[tokio::test]
    async fn test_mirror_page_returned_when_nothing_embedded() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/10.1/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>captcha</p>"))
            .mount(&mock_server)
            .await;

        let strategy = MirrorStrategy::new(client(), vec![mock_server.uri()]);
        let step = strategy
            .attempt(&Doi::parse("10.1/x").unwrap())
            .await
            .unwrap();
        let StrategyStep::Found(url) = step else {
            panic!("expected Found");
        };
        assert_eq!(url.as_str(), format!("{}/10.1/x", mock_server.uri()));
    }

    #[tokio::test]
    async fn test_all_mirrors_miss_is_not_found() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let strategy = MirrorStrategy::new(client(), vec![mock_server.uri()]);
        let step = strategy
            .attempt(&Doi::parse("10.1/x").unwrap())
            .await
            .unwrap();
        assert!(matches!(step, StrategyStep::NotFound(reason) if reason.contains("404")));
    }
}
