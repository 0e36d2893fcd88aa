//! Content-addressed fingerprinting (`§4.10`, `§9`).
//!
//! Fingerprints are SHA-256, not the faster tree hash used elsewhere in
//! this codebase's lineage — the specification calls for a
//! widely-interoperable digest here since the fingerprint crosses the
//! message bus and object-store boundary.

use sha2::{Digest, Sha256};

/// Prefix stamped on every fingerprint; storage keys replace `:` with `_`
/// when the fingerprint is embedded in a path (`§6`, `§9`).
pub const FINGERPRINT_PREFIX: &str = "sha256:";

/// Hash raw file bytes into a `sha256:`-prefixed fingerprint.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    format!("{FINGERPRINT_PREFIX}{}", hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Turn a fingerprint into a filesystem/storage-key-safe form by replacing
/// `:` with `_` (`§6`).
pub fn fingerprint_to_key_segment(fingerprint: &str) -> String {
    fingerprint.replace(':', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_has_sha256_prefix() {
        let fp = fingerprint_bytes(b"hello");
        assert!(fp.starts_with(FINGERPRINT_PREFIX));
        assert_eq!(fp.len(), FINGERPRINT_PREFIX.len() + 64);
    }

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(fingerprint_bytes(b"same"), fingerprint_bytes(b"same"));
        assert_ne!(fingerprint_bytes(b"a"), fingerprint_bytes(b"b"));
    }

    #[test]
    fn key_segment_replaces_colon() {
        let fp = "sha256:abcd";
        assert_eq!(fingerprint_to_key_segment(fp), "sha256_abcd");
    }
}
