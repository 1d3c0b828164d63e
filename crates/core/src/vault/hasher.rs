//! Content hashing for change detection.

use sha2::{Digest, Sha256};

/// SHA-256 of the raw content as a lowercase hex string.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
