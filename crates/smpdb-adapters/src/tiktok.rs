//! TikTok payload adapter.
//!
//! Tracks the clockworks tiktok-scraper item shape. Field dictionary, first
//! match wins:
//!
//! - id:        `id`, `itemId`
//! - text:      `text`, `desc`
//! - author:    `authorMeta.name`, `author.uniqueId` (+ `fans`, `verified`)
//! - counters:  `diggCount` (likes), `shareCount`, `commentCount` (replies),
//!              `playCount` (views)
//! - timestamp: `createTimeISO`, epoch `createTime`
//! - hashtags:  `hashtags[].name`
//! - media:     `videoMeta.downloadAddr`, `webVideoUrl`
//! - geo:       `locationMeta.city`, `authorMeta.region`
//!
//! No mention array exists in any known version; mentions are harvested
//! from the text. Quote counts do not exist on TikTok and stay zero.

use chrono::Utc;
use serde_json::Value;

use smpdb_core::{AuthorInfo, Engagement, NewPost, Platform};

use crate::{
    fields,
    text::{harvest_hashtags, harvest_mentions, normalize_tags},
    AdapterError,
};

const PLATFORM: Platform = Platform::Tiktok;

const ID_PATHS: &[&str] = &["id", "itemId"];
const CONTENT_PATHS: &[&str] = &["text", "desc"];
const AUTHOR_PATHS: &[&str] = &["authorMeta.name", "author.uniqueId"];

pub(crate) fn adapt(raw: &Value) -> Result<NewPost, AdapterError> {
    let source_id = fields::first_id(raw, ID_PATHS)
        .ok_or_else(|| AdapterError::malformed(PLATFORM, "no item id in any known field"))?;

    let username = fields::first_str(raw, AUTHOR_PATHS)
        .ok_or_else(|| AdapterError::malformed(PLATFORM, "no author handle"))?
        .to_string();

    let content = fields::content_str(raw, CONTENT_PATHS)
        .ok_or_else(|| AdapterError::malformed(PLATFORM, "no caption field"))?;

    let author = AuthorInfo {
        username,
        display_name: fields::first_str(raw, &["authorMeta.nickName", "author.nickname"])
            .map(str::to_string),
        follower_count: fields::metric(raw, PLATFORM, &["authorMeta.fans", "author.fans"]),
        verified: fields::flag(raw, &["authorMeta.verified", "author.verified"], &[]),
    };

    let engagement = Engagement {
        likes: fields::metric(raw, PLATFORM, &["diggCount", "stats.diggCount"]),
        shares: fields::metric(raw, PLATFORM, &["shareCount", "stats.shareCount"]),
        replies: fields::metric(raw, PLATFORM, &["commentCount", "stats.commentCount"]),
        views: fields::metric(raw, PLATFORM, &["playCount", "stats.playCount"]),
        quotes: 0,
    };

    let mut hashtags = normalize_tags(fields::str_array(raw, "hashtags", "name"));
    if hashtags.is_empty() {
        hashtags = harvest_hashtags(&content);
    }

    let (media_urls, media_types) = media(raw);

    Ok(NewPost {
        platform: PLATFORM,
        source_id,
        author,
        mentions: harvest_mentions(&content),
        content,
        media_urls,
        media_types,
        engagement,
        hashtags,
        is_retweet: false,
        is_quote: false,
        is_reply: false,
        posted_at: fields::first_datetime(raw, &["createTimeISO", "createTime"]),
        collected_at: fields::first_datetime(raw, &["scrapedAt"]).unwrap_or_else(Utc::now),
        geo_hint: fields::first_str(raw, &["locationMeta.city", "authorMeta.region"])
            .map(str::to_string),
        raw_payload: raw.clone(),
    })
}

/// Every TikTok item is a single video; one url, type `video`.
fn media(raw: &Value) -> (Vec<String>, Vec<String>) {
    match fields::first_str(raw, &["videoMeta.downloadAddr", "webVideoUrl"]) {
        Some(url) => (vec![url.to_string()], vec!["video".to_string()]),
        None => (Vec::new(), Vec::new()),
    }
}
