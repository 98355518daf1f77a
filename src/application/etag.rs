//! Content fingerprinting for conditional-request validation.
//!
//! The ETag is a SHA-256 hex digest over the exact final encoded bytes. It
//! is never used to address the cache and is only computed after the full
//! pipeline and encode have completed.

use sha2::{Digest, Sha256};

/// Computes the hex digest of the encoded output bytes.
#[must_use]
pub fn compute(encoded: &[u8]) -> String {
    let digest = Sha256::digest(encoded);
    format!("{digest:x}")
}

/// Compares a request validator (`If-None-Match` value) against a computed
/// ETag, tolerating surrounding quotes and a weak-validator prefix.
#[must_use]
pub fn matches(validator: &str, etag: &str) -> bool {
    let stripped = validator.trim();
    let stripped = stripped.strip_prefix("W/").unwrap_or(stripped);
    stripped.trim_matches('"') == etag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_a_pure_function_of_the_bytes() {
        assert_eq!(compute(b"abc"), compute(b"abc"));
        assert_ne!(compute(b"abc"), compute(b"abd"));
    }

    #[test]
    fn digest_is_hex_sha256() {
        let etag = compute(b"");
        assert_eq!(etag.len(), 64);
        assert_eq!(
            etag,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn validator_comparison_tolerates_quoting() {
        let etag = compute(b"payload");
        assert!(matches(&etag, &etag));
        assert!(matches(&format!("\"{etag}\""), &etag));
        assert!(matches(&format!("W/\"{etag}\""), &etag));
        assert!(!matches("something-else", &etag));
    }
}
