//! Canonical content hashing, the link value of the page history chain.
//!
//! The canonical encoding is compact JSON with no trailing newline:
//! `time`, `version`, `blocks` in that order (absent fields omitted), each
//! block as `id`, `type`, `data`, and every object inside `data` with its keys
//! sorted. Sorted `data` keys come from round-tripping payloads through
//! `serde_json::Value`, whose map is ordered as long as serde_json's
//! `preserve_order` feature stays off. The desktop application and external
//! agents hash the same bytes.

use sha2::{Digest, Sha256};

use crate::core::page::PageContent;
use crate::Result;

/// Prefix carried by every content hash.
pub const HASH_PREFIX: &str = "sha256:";

/// `prevHash` of the first entry in a page history.
pub const GENESIS: &str = "genesis";

/// Returns the canonical byte encoding of `content`.
///
/// # Errors
///
/// Returns [`crate::NousError::Json`] if the content cannot be serialized.
pub fn canonical_bytes(content: &PageContent) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(content)?)
}

/// Returns `sha256:<hex>` over the canonical encoding of `content`.
///
/// # Errors
///
/// Returns [`crate::NousError::Json`] if the content cannot be serialized.
pub fn content_hash(content: &PageContent) -> Result<String> {
    let digest = Sha256::digest(canonical_bytes(content)?);
    Ok(format!("{HASH_PREFIX}{}", hex::encode(digest)))
}
