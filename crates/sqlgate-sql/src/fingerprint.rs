//! Query fingerprints.
//!
//! A fingerprint identifies the shape of a query: canonical text with
//! all values erased, hashed with SHA-256 and truncated. Two queries
//! that differ only in literal values or identifier case share one
//! fingerprint, which makes decisions correlatable across requests.

use sha2::{Digest, Sha256};

use crate::ast::Query;
use crate::error::SqlError;
use crate::render::DialectRenderer;

/// Hex length of a fingerprint: first 16 bytes of the SHA-256 digest.
const FINGERPRINT_HEX_LEN: usize = 32;

/// Fingerprint of a query's canonical form.
pub fn fingerprint(renderer: &DialectRenderer, query: &Query) -> Result<String, SqlError> {
    let canonical = renderer.canonical_text(query)?;
    Ok(fingerprint_text(&canonical))
}

/// Fingerprint of already-canonical text.
pub fn fingerprint_text(canonical: &str) -> String {
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_HEX_LEN);
    hex
}
