//! Port definition for upstream image fetching.

use bytes::Bytes;

use crate::domain::entities::SourceFormat;
use crate::domain::errors::FetchError;

/// Raw source bytes plus the upstream-declared format.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// The response body.
    pub bytes: Bytes,
    /// Format resolved from the upstream `Content-Type` subtype.
    pub format: SourceFormat,
}

/// Port for retrieving source image bytes from an upstream URL.
/// Implementations must be thread-safe.
#[async_trait::async_trait]
pub trait FetchPort: Send + Sync {
    /// Fetches the bytes at `url`, following redirects, within the
    /// implementation's timeout.
    ///
    /// # Errors
    /// Returns [`FetchError::UpstreamStatus`] on a non-2xx final status,
    /// [`FetchError::UpstreamUnreachable`] on network or timeout failure,
    /// and [`FetchError::UnsupportedContentType`] when the declared subtype
    /// is outside the `{jpeg, jpg, png, webp}` allow-list.
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError>;
}
