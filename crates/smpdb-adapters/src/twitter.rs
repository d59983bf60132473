//! Twitter/X payload adapter.
//!
//! Tracks the apidojo tweet-scraper item shape plus the older API v1.1
//! style dumps some actors still emit. Field dictionary, first match wins:
//!
//! - id:        `id`, `id_str`, `tweetId`
//! - text:      `text`, `full_text`, `fullText`
//! - username:  `author.userName`, `user.screen_name`
//! - likes:     `likeCount`, `favorite_count`
//! - shares:    `retweetCount`, `retweet_count`
//! - timestamp: `createdAt`, `created_at` (RFC 3339 or `Wed Jan 15 ...` legacy)
//!
//! Native tag arrays (`entities.hashtags`, `entities.user_mentions`) are
//! preferred; the text harvest is the fallback when they are absent or empty.

use chrono::Utc;
use serde_json::Value;

use smpdb_core::{AuthorInfo, Engagement, NewPost, Platform};

use crate::{
    fields,
    text::{harvest_hashtags, harvest_mentions, normalize_tags},
    AdapterError,
};

const PLATFORM: Platform = Platform::Twitter;

const ID_PATHS: &[&str] = &["id", "id_str", "tweetId"];
const CONTENT_PATHS: &[&str] = &["text", "full_text", "fullText"];
const USERNAME_PATHS: &[&str] = &["author.userName", "user.screen_name"];

pub(crate) fn adapt(raw: &Value) -> Result<NewPost, AdapterError> {
    let source_id = fields::first_id(raw, ID_PATHS)
        .ok_or_else(|| AdapterError::malformed(PLATFORM, "no tweet id in any known field"))?;

    let username = fields::first_str(raw, USERNAME_PATHS)
        .ok_or_else(|| AdapterError::malformed(PLATFORM, "no author username"))?
        .to_string();

    let content = fields::content_str(raw, CONTENT_PATHS)
        .ok_or_else(|| AdapterError::malformed(PLATFORM, "no text field"))?;

    let author = AuthorInfo {
        username,
        display_name: fields::first_str(raw, &["author.name", "user.name"]).map(str::to_string),
        follower_count: fields::metric(raw, PLATFORM, &["author.followers", "user.followers_count"]),
        verified: fields::flag(
            raw,
            &["author.isVerified", "author.isBlueVerified", "user.verified"],
            &[],
        ),
    };

    let engagement = Engagement {
        likes: fields::metric(raw, PLATFORM, &["likeCount", "favorite_count"]),
        shares: fields::metric(raw, PLATFORM, &["retweetCount", "retweet_count"]),
        replies: fields::metric(raw, PLATFORM, &["replyCount", "reply_count"]),
        views: fields::metric(raw, PLATFORM, &["viewCount", "views_count"]),
        quotes: fields::metric(raw, PLATFORM, &["quoteCount", "quote_count"]),
    };

    let mut hashtags = normalize_tags(fields::str_array(raw, "entities.hashtags", "text"));
    if hashtags.is_empty() {
        hashtags = harvest_hashtags(&content);
    }
    let mut mentions = normalize_tags(fields::str_array(raw, "entities.user_mentions", "screen_name"));
    if mentions.is_empty() {
        mentions = harvest_mentions(&content);
    }

    let (media_urls, media_types) = media(raw);

    Ok(NewPost {
        platform: PLATFORM,
        source_id,
        author,
        content,
        media_urls,
        media_types,
        engagement,
        hashtags,
        mentions,
        is_retweet: fields::flag(raw, &["isRetweet"], &["retweeted_status", "retweeted_tweet"]),
        is_quote: fields::flag(raw, &["isQuote"], &["quoted_status_id", "quoted_tweet"]),
        is_reply: fields::flag(raw, &["isReply"], &["in_reply_to_status_id"]),
        posted_at: fields::first_datetime(raw, &["createdAt", "created_at"]),
        collected_at: fields::first_datetime(raw, &["scrapedAt"]).unwrap_or_else(Utc::now),
        geo_hint: fields::first_str(
            raw,
            &["place.full_name", "author.location", "user.location"],
        )
        .map(str::to_string),
        raw_payload: raw.clone(),
    })
}

/// Media attachments from `extendedEntities.media` (or the v1.1
/// `entities.media`). Urls and types stay index-aligned.
fn media(raw: &Value) -> (Vec<String>, Vec<String>) {
    let items = fields::lookup(raw, "extendedEntities.media")
        .or_else(|| fields::lookup(raw, "entities.media"))
        .and_then(Value::as_array);

    let mut urls = Vec::new();
    let mut types = Vec::new();
    if let Some(items) = items {
        for item in items {
            let Some(url) = item
                .get("media_url_https")
                .or_else(|| item.get("url"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            urls.push(url.to_string());
            types.push(
                item.get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("photo")
                    .to_string(),
            );
        }
    }
    (urls, types)
}
