//! Constants for the download module (timeouts, rate limiting).

use std::time::Duration;

/// Default per-request timeout for API and page requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for PDF downloads.
pub const DOCUMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for publisher landing-page resolution.
pub const PUBLISHER_TIMEOUT: Duration = Duration::from_secs(20);

/// Timeout for each mirror page.
pub const MIRROR_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect timeout shared by all request kinds.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Warning threshold for cumulative rate limit delay (30 seconds).
pub const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Magic bytes at the start of every PDF file.
pub const PDF_MAGIC: &[u8] = b"%PDF";
