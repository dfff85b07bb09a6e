//! User-Agent strings for API and page traffic.
//!
//! Metadata APIs get an identifying tool UA (Crossref routes those to its
//! polite pool). Landing pages, mirrors and PDF hosts get a browser UA since
//! many of them serve bot-detection pages to anything else.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/refcrawler";

/// Browser User-Agent for publisher pages, mirrors and document downloads.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default User-Agent for API requests (identifies the tool).
#[must_use]
pub(crate) fn default_api_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("refcrawler/{version} (citation-crawler; +{PROJECT_UA_URL})")
}
