//! Trend-search payload adapter.
//!
//! Tracks trending-search scraper items (one row per trending query with an
//! attached headline). Field dictionary, first match wins:
//!
//! - id:        `id`, `trendId`, `queryId` (required; ids are never synthesised)
//! - content:   `title` plus `snippet` when present
//! - author:    `source`, `query` (the closest thing a trend item has)
//! - views:     `traffic`, `volume`, `formattedTraffic` (`200K+` style
//!              approximate strings accepted)
//! - timestamp: `publishedAt`, `date`
//!
//! Trend items carry no media, no structural flags, and no native tag
//! arrays; hashtags and mentions are harvested from the composed content.

use chrono::Utc;
use serde_json::Value;

use smpdb_core::{AuthorInfo, Engagement, NewPost, Platform};

use crate::{
    fields,
    text::{harvest_hashtags, harvest_mentions},
    AdapterError,
};

const PLATFORM: Platform = Platform::Trends;

const ID_PATHS: &[&str] = &["id", "trendId", "queryId"];
const TRAFFIC_PATHS: &[&str] = &["traffic", "volume", "formattedTraffic"];

pub(crate) fn adapt(raw: &Value) -> Result<NewPost, AdapterError> {
    let source_id = fields::first_id(raw, ID_PATHS)
        .ok_or_else(|| AdapterError::malformed(PLATFORM, "no trend id in any known field"))?;

    let title = fields::first_str(raw, &["title"])
        .ok_or_else(|| AdapterError::malformed(PLATFORM, "no title"))?;

    let content = match fields::first_str(raw, &["snippet"]) {
        Some(snippet) => format!("{title}\n{snippet}"),
        None => title.to_string(),
    };

    let author = AuthorInfo {
        username: fields::first_str(raw, &["source", "query"])
            .unwrap_or("trends")
            .to_string(),
        display_name: fields::first_str(raw, &["source"]).map(str::to_string),
        follower_count: 0,
        verified: false,
    };

    let engagement = Engagement {
        views: traffic(raw),
        ..Engagement::default()
    };

    Ok(NewPost {
        platform: PLATFORM,
        source_id,
        author,
        hashtags: harvest_hashtags(&content),
        mentions: harvest_mentions(&content),
        content,
        media_urls: Vec::new(),
        media_types: Vec::new(),
        engagement,
        is_retweet: false,
        is_quote: false,
        is_reply: false,
        posted_at: fields::first_datetime(raw, &["publishedAt", "date"]),
        collected_at: fields::first_datetime(raw, &["scrapedAt"]).unwrap_or_else(Utc::now),
        geo_hint: None,
        raw_payload: raw.clone(),
    })
}

/// Traffic estimate mapped onto views. Numbers pass through; approximate
/// strings like `200K+` are expanded. A total miss warns and yields 0 like
/// every other engagement metric.
fn traffic(raw: &Value) -> i64 {
    for path in TRAFFIC_PATHS {
        match fields::lookup(raw, path) {
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_i64() {
                    return v;
                }
            }
            Some(Value::String(s)) => {
                if let Some(v) = fields::parse_approx_count(s) {
                    return v;
                }
            }
            _ => {}
        }
    }
    tracing::warn!(
        platform = %PLATFORM,
        field = TRAFFIC_PATHS[0],
        "missing engagement metric, defaulting to 0"
    );
    0
}
