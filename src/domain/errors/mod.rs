//! Error taxonomy for the proxy pipeline.
//!
//! Every user-facing failure flows through [`ProxyError`], which separates
//! the full diagnostic text (its `Display`, logged server-side) from the
//! sanitized [`ProxyError::user_message`] that may be interpolated into a
//! response body. Cache I/O failures live in [`CacheError`] and never reach
//! the caller: caching is best-effort.

use thiserror::Error;

/// Failures while fetching source bytes from the upstream origin.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Upstream answered with a non-2xx final status.
    #[error("upstream returned status {status}")]
    UpstreamStatus {
        /// The final HTTP status code.
        status: u16,
    },

    /// Network or timeout failure before a final response arrived.
    #[error("upstream unreachable: {cause}")]
    UpstreamUnreachable {
        /// Underlying cause, for server-side logs only.
        cause: String,
    },

    /// Upstream declared a content type outside the image allow-list.
    #[error("unsupported content type: {subtype}")]
    UnsupportedContentType {
        /// What the upstream declared, e.g. `svg+xml` or `text/html`.
        subtype: String,
    },
}

/// Failures delegated from the foreground-segmentation capability.
#[derive(Debug, Clone, Error)]
pub enum SegmentationError {
    /// No segmentation backend is configured.
    #[error("no segmentation backend configured")]
    Unavailable,

    /// The backend was invoked and failed.
    #[error("segmentation failed: {0}")]
    Failed(String),
}

/// Cache I/O failures. Logged and swallowed at every call site; a request
/// never fails because the cache does.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Filesystem error while reading or writing the store.
    #[error("cache I/O error: {0}")]
    Io(String),
}

impl CacheError {
    /// Creates an I/O error from any displayable cause.
    #[must_use]
    pub fn io(cause: impl std::fmt::Display) -> Self {
        Self::Io(cause.to_string())
    }
}

/// Top-level error for a proxied request.
#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    /// Malformed or out-of-range user input, including an invalid source
    /// URL.
    #[error("invalid parameter: {message}")]
    InvalidParameter {
        /// Description of the offending parameter.
        message: String,
    },

    /// Source fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Fetched bytes could not be decoded as an image.
    #[error("unsupported image format: {detail}")]
    UnsupportedFormat {
        /// Decoder diagnostic, for server-side logs only.
        detail: String,
    },

    /// A transform operation failed mid-pipeline.
    #[error("transform '{operation}' failed: {detail}")]
    Transform {
        /// Name of the failing operation.
        operation: &'static str,
        /// Diagnostic detail, for server-side logs only.
        detail: String,
    },

    /// Unanticipated internal failure.
    #[error("internal error: {message}")]
    Internal {
        /// Diagnostic detail, for server-side logs only.
        message: String,
    },
}

impl ProxyError {
    /// Creates an invalid-parameter error.
    #[must_use]
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Creates an unsupported-format error from a decoder diagnostic.
    #[must_use]
    pub fn unsupported_format(detail: impl std::fmt::Display) -> Self {
        Self::UnsupportedFormat {
            detail: detail.to_string(),
        }
    }

    /// Creates a transform error for the named operation.
    #[must_use]
    pub fn transform(operation: &'static str, detail: impl std::fmt::Display) -> Self {
        Self::Transform {
            operation,
            detail: detail.to_string(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl std::fmt::Display) -> Self {
        Self::Internal {
            message: message.to_string(),
        }
    }

    /// HTTP status code this error maps to at the boundary.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Internal { .. } => 500,
            _ => 400,
        }
    }

    /// Sanitized message safe to interpolate into a response body. Upstream
    /// and decoder internals never appear here; the full detail stays in the
    /// server-side log.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidParameter { message } => format!("Invalid parameter: {message}."),
            Self::Fetch(
                FetchError::UpstreamStatus { .. } | FetchError::UpstreamUnreachable { .. },
            ) => "The requested image could not be fetched, from upstream origin.".to_owned(),
            Self::Fetch(FetchError::UnsupportedContentType { .. })
            | Self::UnsupportedFormat { .. } => {
                "The requested image was not in a supported format.".to_owned()
            }
            Self::Transform { operation, .. } => {
                format!("Error applying modification: {operation}.")
            }
            Self::Internal { .. } => "An internal server error occurred.".to_owned(),
        }
    }
}
