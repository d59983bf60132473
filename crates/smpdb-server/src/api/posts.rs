use std::str::FromStr;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use smpdb_core::Platform;
use smpdb_db::PostFilters;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct PostsQuery {
    pub platform: Option<String>,
    pub author: Option<String>,
    pub hashtag: Option<String>,
    pub sentiment: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A post as listed by the API. The stored raw payload is deliberately
/// omitted; listings stay small.
#[derive(Debug, Serialize)]
pub(super) struct PostItem {
    id: i64,
    platform: String,
    source_id: String,
    author_username: String,
    author_display_name: Option<String>,
    author_follower_count: i64,
    author_verified: bool,
    content: String,
    likes: i64,
    shares: i64,
    replies: i64,
    views: i64,
    quotes: i64,
    hashtags: Vec<String>,
    mentions: Vec<String>,
    is_retweet: bool,
    is_quote: bool,
    is_reply: bool,
    posted_at: Option<DateTime<Utc>>,
    collected_at: DateTime<Utc>,
    geo_hint: Option<String>,
}

pub(super) async fn list_posts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<PostsQuery>,
) -> Result<Json<ApiResponse<Vec<PostItem>>>, ApiError> {
    // Reject unknown platforms instead of silently returning nothing.
    if let Some(platform) = query.platform.as_deref() {
        Platform::from_str(platform).map_err(|e| {
            ApiError::new(req_id.0.clone(), "validation_error", e.to_string())
        })?;
    }

    let filters = PostFilters {
        platform: query.platform.as_deref(),
        author_username: query.author.as_deref(),
        hashtag: query.hashtag.as_deref(),
        sentiment: query.sentiment.as_deref(),
        collected_from: query.from,
        collected_to: query.to,
        limit: normalize_limit(query.limit),
        offset: query.offset.unwrap_or(0).max(0),
    };

    let rows = smpdb_db::list_posts(&state.pool, filters)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|post| PostItem {
            id: post.id,
            platform: post.platform,
            source_id: post.source_id,
            author_username: post.author_username,
            author_display_name: post.author_display_name,
            author_follower_count: post.author_follower_count,
            author_verified: post.author_verified,
            content: post.content,
            likes: post.likes,
            shares: post.shares,
            replies: post.replies,
            views: post.views,
            quotes: post.quotes,
            hashtags: post.hashtags,
            mentions: post.mentions,
            is_retweet: post.is_retweet,
            is_quote: post.is_quote,
            is_reply: post.is_reply,
            posted_at: post.posted_at,
            collected_at: post.collected_at,
            geo_hint: post.geo_hint,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
