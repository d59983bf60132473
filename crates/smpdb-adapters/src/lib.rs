//! Source adapters: one raw provider payload in, one canonical [`NewPost`] out.
//!
//! Each platform module documents the payload dictionary it tracks and maps
//! it through explicit fallback chains — scraper actors rename fields
//! between versions, and the chains absorb that drift without code changes
//! in the rest of the pipeline. Adapters never invent identity: a payload
//! whose id or author cannot be derived is rejected whole.

use serde_json::Value;
use thiserror::Error;

use smpdb_core::{NewPost, Platform};

mod facebook;
mod fields;
mod text;
mod tiktok;
mod trends;
mod twitter;

pub use text::{harvest_hashtags, harvest_mentions};

#[derive(Debug, Error)]
pub enum AdapterError {
    /// The payload is missing identity the canonical model requires. The
    /// record is dropped whole; nothing is ever stored partially.
    #[error("malformed {platform} payload: {reason}")]
    Malformed { platform: Platform, reason: String },
}

impl AdapterError {
    pub(crate) fn malformed(platform: Platform, reason: impl Into<String>) -> Self {
        AdapterError::Malformed {
            platform,
            reason: reason.into(),
        }
    }
}

/// Convert one raw provider payload into a canonical post.
///
/// # Errors
///
/// Returns [`AdapterError::Malformed`] when the payload lacks required
/// identity (post id, author). Missing optional metrics never fail; they
/// coerce to defaults with a warning.
pub fn adapt(platform: Platform, raw: &Value) -> Result<NewPost, AdapterError> {
    match platform {
        Platform::Twitter => twitter::adapt(raw),
        Platform::Facebook => facebook::adapt(raw),
        Platform::Tiktok => tiktok::adapt(raw),
        Platform::Trends => trends::adapt(raw),
    }
}
