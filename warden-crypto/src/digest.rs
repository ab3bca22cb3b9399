//! Digests used for document canonicalization and derived tokens.

use sha2::{Digest, Sha256, Sha512};

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Short decimal token derived from `input`.
///
/// The first two bytes of the SHA-512 digest, read little-endian as a `u16`.
/// Empty input yields an empty token so that "no source value" stays
/// distinguishable from any real token.
pub fn short_token(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    let hash = Sha512::digest(input.as_bytes());
    u16::from_le_bytes([hash[0], hash[1]]).to_string()
}
