//! Content-addressed cache key derivation.

use sha2::{Digest, Sha256};

/// Cache key for a source URL: the SHA-256 hex digest of the literal URL
/// string. Stable across calls, case- and query-order-sensitive, so distinct
/// query strings address distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for a source URL.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let digest = Sha256::digest(url.as_bytes());
        Self(format!("{digest:x}"))
    }

    /// The hex digest, used as the cache file stem.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
