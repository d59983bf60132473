//! Facebook payload adapter.
//!
//! Tracks the facebook-posts-scraper item shape. Field dictionary, first
//! match wins:
//!
//! - id:        `postId`, `post_id`, `legacyId`
//! - text:      `text`, `message`
//! - author:    `pageName`, `user.name`
//! - counters:  `likes`, `shares`, `comments` (mapped to replies), `viewsCount`
//! - timestamp: `time`, `timestamp` (epoch seconds or RFC 3339)
//! - media:     `media[].thumbnail` / `media[].url`
//!
//! Facebook items carry no native hashtag or mention arrays; both are
//! harvested from the text. There is no quote counter either — quotes stay
//! zero without a warning.

use chrono::Utc;
use serde_json::Value;

use smpdb_core::{AuthorInfo, Engagement, NewPost, Platform};

use crate::{
    fields,
    text::{harvest_hashtags, harvest_mentions},
    AdapterError,
};

const PLATFORM: Platform = Platform::Facebook;

const ID_PATHS: &[&str] = &["postId", "post_id", "legacyId"];
const CONTENT_PATHS: &[&str] = &["text", "message"];
const AUTHOR_PATHS: &[&str] = &["pageName", "user.name"];

pub(crate) fn adapt(raw: &Value) -> Result<NewPost, AdapterError> {
    let source_id = fields::first_id(raw, ID_PATHS)
        .ok_or_else(|| AdapterError::malformed(PLATFORM, "no post id in any known field"))?;

    let username = fields::first_str(raw, AUTHOR_PATHS)
        .ok_or_else(|| AdapterError::malformed(PLATFORM, "no page or user name"))?
        .to_string();

    let content = fields::content_str(raw, CONTENT_PATHS)
        .ok_or_else(|| AdapterError::malformed(PLATFORM, "no text field"))?;

    let author = AuthorInfo {
        display_name: Some(username.clone()),
        username,
        // Post items rarely carry page follower counts; absent is normal
        // here, so no warning.
        follower_count: fields::first_value(raw, &["pageFollowers", "user.followers"])
            .and_then(Value::as_i64)
            .unwrap_or(0),
        verified: fields::flag(raw, &["pageVerified", "user.verified"], &[]),
    };

    let engagement = Engagement {
        likes: fields::metric(raw, PLATFORM, &["likes", "likesCount"]),
        shares: fields::metric(raw, PLATFORM, &["shares", "sharesCount"]),
        replies: fields::metric(raw, PLATFORM, &["comments", "commentsCount"]),
        views: fields::metric(raw, PLATFORM, &["viewsCount", "viewCount"]),
        quotes: 0,
    };

    let (media_urls, media_types) = media(raw);

    Ok(NewPost {
        platform: PLATFORM,
        source_id,
        author,
        hashtags: harvest_hashtags(&content),
        mentions: harvest_mentions(&content),
        content,
        media_urls,
        media_types,
        engagement,
        is_retweet: false,
        is_quote: false,
        is_reply: false,
        posted_at: fields::first_datetime(raw, &["time", "timestamp"]),
        collected_at: fields::first_datetime(raw, &["scrapedAt"]).unwrap_or_else(Utc::now),
        geo_hint: None,
        raw_payload: raw.clone(),
    })
}

fn media(raw: &Value) -> (Vec<String>, Vec<String>) {
    let mut urls = Vec::new();
    let mut types = Vec::new();
    if let Some(items) = fields::lookup(raw, "media").and_then(Value::as_array) {
        for item in items {
            let Some(url) = item
                .get("thumbnail")
                .or_else(|| item.get("url"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            urls.push(url.to_string());
            types.push(
                item.get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
            );
        }
    }
    (urls, types)
}
