//! Response DTO for the embedding HTTP layer.
//!
//! The orchestrator never writes sockets; it produces this value and the
//! router writes status, headers, and body verbatim.

use bytes::Bytes;
use serde::Serialize;

use crate::domain::errors::ProxyError;

/// `Cache-Control` value sent with every successful image response.
pub const CACHE_CONTROL: &str = "max-age=18000";

/// Custom header carrying the source-fetch cache status.
pub const CACHE_STATUS_HEADER: &str = "x-pixelgate-cache";

/// Whether the source bytes came from the cache or a fresh fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Source bytes were served from the disk cache.
    Hit,
    /// Source bytes were fetched from the upstream origin.
    Miss,
}

impl CacheStatus {
    /// Header value for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    message: &'a str,
}

/// A fully resolved response: status, headers, body.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header value, if any.
    pub content_type: Option<&'static str>,
    /// `ETag` header value, if any.
    pub etag: Option<String>,
    /// `Cache-Control` header value, if any.
    pub cache_control: Option<&'static str>,
    /// Cache hit/miss status for the custom header, if any.
    pub cache_status: Option<CacheStatus>,
    /// Response body; empty for 304.
    pub body: Bytes,
}

impl ProxyResponse {
    /// A 200 response carrying transformed image bytes.
    #[must_use]
    pub fn image(
        body: Bytes,
        content_type: &'static str,
        etag: String,
        cache_status: CacheStatus,
    ) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type),
            etag: Some(etag),
            cache_control: Some(CACHE_CONTROL),
            cache_status: Some(cache_status),
            body,
        }
    }

    /// A 304 response for a matching conditional validator.
    #[must_use]
    pub fn not_modified(etag: String) -> Self {
        Self {
            status: 304,
            content_type: None,
            etag: Some(etag),
            cache_control: Some(CACHE_CONTROL),
            cache_status: None,
            body: Bytes::new(),
        }
    }

    /// The JSON error response for a pipeline failure, using the error's
    /// sanitized message.
    #[must_use]
    pub fn error(error: &ProxyError) -> Self {
        Self::json_error(error.status_code(), &error.user_message())
    }

    /// The fixed 503 response sent while the operator kill switch is off.
    #[must_use]
    pub fn service_disabled() -> Self {
        Self::json_error(503, "This service is currently disabled.")
    }

    /// The fixed 404 response for unknown routes.
    #[must_use]
    pub fn not_found() -> Self {
        Self::json_error(404, "The requested resource was not found.")
    }

    /// The fixed 500 response for unanticipated failures.
    #[must_use]
    pub fn internal_error() -> Self {
        Self::json_error(500, "An internal server error occurred.")
    }

    fn json_error(status: u16, message: &str) -> Self {
        let body = serde_json::to_vec(&ErrorBody {
            status: "error",
            message,
        })
        // Serializing a two-field string struct cannot fail.
        .unwrap_or_default();

        Self {
            status,
            content_type: Some("application/json"),
            etag: None,
            cache_control: None,
            cache_status: None,
            body: Bytes::from(body),
        }
    }
}
