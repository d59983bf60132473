//! Canonical record model shared by the ingestion gate, the processing
//! pipeline, and the read API.
//!
//! A [`NewPost`] is what a source adapter produces from one raw provider
//! payload. It is the only shape that crosses the adapter boundary — raw
//! provider dictionaries never leak past `smpdb-adapters` except as the
//! opaque `raw_payload` audit copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CoreError;

/// Source platform of a scraped record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Facebook,
    Tiktok,
    Trends,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Twitter,
        Platform::Facebook,
        Platform::Tiktok,
        Platform::Trends,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Tiktok => "tiktok",
            Platform::Trends => "trends",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "twitter" => Ok(Platform::Twitter),
            "facebook" => Ok(Platform::Facebook),
            "tiktok" => Ok(Platform::Tiktok),
            "trends" => Ok(Platform::Trends),
            other => Err(CoreError::UnknownPlatform(other.to_string())),
        }
    }
}

/// A named AI analysis type applicable to a post.
///
/// `ALL` is ordered — the orchestrator drives capabilities in exactly this
/// sequence so runs are deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Sentiment,
    Location,
    Entity,
    Keyword,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Sentiment,
        Capability::Location,
        Capability::Entity,
        Capability::Keyword,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Sentiment => "sentiment",
            Capability::Location => "location",
            Capability::Entity => "entity",
            Capability::Keyword => "keyword",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sentiment" => Ok(Capability::Sentiment),
            "location" => Ok(Capability::Location),
            "entity" => Ok(Capability::Entity),
            "keyword" => Ok(Capability::Keyword),
            other => Err(CoreError::UnknownCapability(other.to_string())),
        }
    }
}

/// Author fields extracted from a raw payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub username: String,
    pub display_name: Option<String>,
    pub follower_count: i64,
    pub verified: bool,
}

/// Engagement counters. Providers that omit a metric report it as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub likes: i64,
    pub shares: i64,
    pub replies: i64,
    pub views: i64,
    pub quotes: i64,
}

/// The canonical, platform-agnostic record produced by a source adapter.
///
/// Immutable once persisted: the ingestion gate writes it exactly once per
/// `(platform, source_id)` and only processing-status and result rows mutate
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub platform: Platform,
    pub source_id: String,
    pub author: AuthorInfo,
    pub content: String,
    pub media_urls: Vec<String>,
    pub media_types: Vec<String>,
    pub engagement: Engagement,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub is_retweet: bool,
    pub is_quote: bool,
    pub is_reply: bool,
    pub posted_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
    pub geo_hint: Option<String>,
    /// Original provider payload, preserved verbatim for audit and
    /// model-upgrade reprocessing.
    pub raw_payload: Value,
}
