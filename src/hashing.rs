//! Archive digests.
//!
//! Every archived asset gets a SHA-256 of its encoded bytes; the manifest as a
//! whole gets a SHA-256 of its canonical JSON form.

use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compact JSON with object keys in lexical order. `serde_json::Map` is
/// ordered by key as long as `preserve_order` stays disabled.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&serde_json::to_value(value)?)
}

/// Digest of a manifest, computed with its own hash field still blank.
pub fn compute_manifest_hash<T: Serialize>(manifest: &T) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(canonical_json(manifest)?.as_bytes()))
}
