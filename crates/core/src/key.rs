//! Normalized request identity for store keys.

use sha2::{Digest, Sha256};

/// Compute the store key for a request.
///
/// Identity is method plus canonical URL; the URL is expected to already be
/// canonicalized (lowercase host, no fragment). The method is folded to
/// uppercase so `get` and `GET` address the same record.
pub fn request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
