//! Request key generation for cached entries.

use sha2::{Digest, Sha256};

/// Compute the stable cache key for a request (method + URL).
///
/// The method is uppercased; the URL is used verbatim, so callers should pass a
/// canonical form (fragment removed).
pub fn request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
