//! Upstream HTTP fetcher with timeout and content-type allow-listing.

use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::entities::SourceFormat;
use crate::domain::errors::{FetchError, ProxyError};
use crate::domain::ports::{FetchPort, FetchedImage};

/// Fixed timeout applied to every upstream fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Fixed User-Agent sent with every upstream request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/114.0.0.0 Mobile Safari/537.36";

/// Fetches source images over HTTP, following redirects.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the given timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProxyError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Creates a fetcher with the default 5-second timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn with_default_timeout() -> Result<Self, ProxyError> {
        Self::new(FETCH_TIMEOUT)
    }
}

#[async_trait::async_trait]
impl FetchPort for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(url, error = %e, "Upstream fetch failed");
            FetchError::UpstreamUnreachable {
                cause: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "Upstream returned non-success status");
            return Err(FetchError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let declared = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        // Reject disallowed formats before any bytes can reach the cache.
        let format = resolve_format(declared.as_deref())?;

        let bytes = response.bytes().await.map_err(|e| {
            warn!(url, error = %e, "Failed to read upstream body");
            FetchError::UpstreamUnreachable {
                cause: e.to_string(),
            }
        })?;

        debug!(url, size = bytes.len(), format = format.extension(), "Fetched source image");

        Ok(FetchedImage { bytes, format })
    }
}

/// Resolves the upstream `Content-Type` header to an allowed format. A
/// missing header or a non-image type is treated as unsupported.
fn resolve_format(content_type: Option<&str>) -> Result<SourceFormat, FetchError> {
    let declared = content_type.unwrap_or("missing");
    let mime = declared
        .split(';')
        .next()
        .unwrap_or(declared)
        .trim()
        .to_ascii_lowercase();

    mime.strip_prefix("image/")
        .and_then(SourceFormat::from_subtype)
        .ok_or_else(|| FetchError::UnsupportedContentType {
            subtype: mime
                .strip_prefix("image/")
                .map_or(declared.to_owned(), str::to_owned),
        })
}
