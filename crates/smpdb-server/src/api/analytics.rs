use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct WindowQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(super) struct GeoItem {
    region: String,
    mentions: i64,
    posts: i64,
    engagement: i64,
    with_coordinates: i64,
    /// Share of mentions that resolved to coordinates, in [0, 1].
    coordinate_share: f64,
}

pub(super) async fn geo_breakdown(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<ApiResponse<Vec<GeoItem>>>, ApiError> {
    let rows = smpdb_db::geo_rollup(&state.pool, query.from, query.to)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    #[allow(clippy::cast_precision_loss)]
    let data = rows
        .into_iter()
        .map(|row| GeoItem {
            coordinate_share: if row.mentions > 0 {
                row.with_coordinates as f64 / row.mentions as f64
            } else {
                0.0
            },
            region: row.region,
            mentions: row.mentions,
            posts: row.posts,
            engagement: row.engagement,
            with_coordinates: row.with_coordinates,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct EngagementQuery {
    pub group_by: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct BucketItem {
    bucket: DateTime<Utc>,
    posts: i64,
    likes: i64,
    shares: i64,
    replies: i64,
    views: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct AuthorItem {
    author_username: String,
    posts: i64,
    likes: i64,
    shares: i64,
    replies: i64,
    views: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct HashtagItem {
    hashtag: String,
    posts: i64,
    likes: i64,
    shares: i64,
    replies: i64,
    views: i64,
}

/// Response payload shape depends on `group_by`; serde flattens the enum
/// away so clients see a plain array either way.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(super) enum EngagementData {
    Buckets(Vec<BucketItem>),
    Authors(Vec<AuthorItem>),
    Hashtags(Vec<HashtagItem>),
}

pub(super) async fn engagement_breakdown(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<EngagementQuery>,
) -> Result<Json<ApiResponse<EngagementData>>, ApiError> {
    let group_by = query.group_by.as_deref().unwrap_or("day");
    let limit = normalize_limit(query.limit);

    let data = match group_by {
        "hour" | "day" => {
            let rows =
                smpdb_db::engagement_over_time(&state.pool, group_by, query.from, query.to)
                    .await
                    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            EngagementData::Buckets(
                rows.into_iter()
                    .map(|row| BucketItem {
                        bucket: row.bucket,
                        posts: row.posts,
                        likes: row.likes,
                        shares: row.shares,
                        replies: row.replies,
                        views: row.views,
                    })
                    .collect(),
            )
        }
        "author" => {
            let rows = smpdb_db::engagement_by_author(&state.pool, limit)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            EngagementData::Authors(
                rows.into_iter()
                    .map(|row| AuthorItem {
                        author_username: row.author_username,
                        posts: row.posts,
                        likes: row.likes,
                        shares: row.shares,
                        replies: row.replies,
                        views: row.views,
                    })
                    .collect(),
            )
        }
        "hashtag" => {
            let rows = smpdb_db::engagement_by_hashtag(&state.pool, limit)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            EngagementData::Hashtags(
                rows.into_iter()
                    .map(|row| HashtagItem {
                        hashtag: row.hashtag,
                        posts: row.posts,
                        likes: row.likes,
                        shares: row.shares,
                        replies: row.replies,
                        views: row.views,
                    })
                    .collect(),
            )
        }
        other => {
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                format!("unknown group_by '{other}'; expected hour, day, author, or hashtag"),
            ));
        }
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Serialize)]
pub(super) struct PlatformItem {
    platform: String,
    posts: i64,
    first_collected_at: DateTime<Utc>,
    last_collected_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct SentimentItem {
    platform: String,
    analyzed: i64,
    positive: i64,
    negative: i64,
    neutral: i64,
    avg_score: Decimal,
}

#[derive(Debug, Serialize)]
pub(super) struct EngagementTotalsItem {
    platform: String,
    posts: i64,
    total_likes: i64,
    total_shares: i64,
    total_replies: i64,
    total_views: i64,
    avg_likes: Decimal,
}

#[derive(Debug, Serialize)]
pub(super) struct HashtagCountItem {
    hashtag: String,
    uses: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct RegionCountItem {
    region: String,
    post_count: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct CapabilityShareItem {
    capability: String,
    total: i64,
    processed: i64,
    /// Share of posts processed for this capability, in [0, 1].
    processed_share: f64,
}

#[derive(Debug, Serialize)]
pub(super) struct SummaryData {
    total_posts: i64,
    platforms: Vec<PlatformItem>,
    sentiment: Vec<SentimentItem>,
    engagement: Vec<EngagementTotalsItem>,
    top_authors: Vec<AuthorItem>,
    top_hashtags: Vec<HashtagCountItem>,
    top_regions: Vec<RegionCountItem>,
    processing: Vec<CapabilityShareItem>,
}

const SUMMARY_TOP_N: i64 = 10;

pub(super) async fn summary(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<SummaryData>>, ApiError> {
    let platforms = smpdb_db::platform_summary(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let sentiment = smpdb_db::sentiment_by_platform(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let engagement = smpdb_db::engagement_summary(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let authors = smpdb_db::engagement_by_author(&state.pool, SUMMARY_TOP_N)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let hashtags = smpdb_db::top_hashtags(&state.pool, None, SUMMARY_TOP_N)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let regions = smpdb_db::top_regions(&state.pool, SUMMARY_TOP_N)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let progress = smpdb_db::get_processing_progress(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    #[allow(clippy::cast_precision_loss)]
    let processing: Vec<CapabilityShareItem> = progress
        .into_iter()
        .map(|row| CapabilityShareItem {
            processed_share: if row.total > 0 {
                row.processed as f64 / row.total as f64
            } else {
                0.0
            },
            capability: row.capability,
            total: row.total,
            processed: row.processed,
        })
        .collect();

    let data = SummaryData {
        total_posts: platforms.iter().map(|row| row.posts).sum(),
        platforms: platforms
            .into_iter()
            .map(|row| PlatformItem {
                platform: row.platform,
                posts: row.posts,
                first_collected_at: row.first_collected_at,
                last_collected_at: row.last_collected_at,
            })
            .collect(),
        sentiment: sentiment
            .into_iter()
            .map(|row| SentimentItem {
                platform: row.platform,
                analyzed: row.analyzed,
                positive: row.positive,
                negative: row.negative,
                neutral: row.neutral,
                avg_score: row.avg_score,
            })
            .collect(),
        engagement: engagement
            .into_iter()
            .map(|row| EngagementTotalsItem {
                platform: row.platform,
                posts: row.posts,
                total_likes: row.total_likes,
                total_shares: row.total_shares,
                total_replies: row.total_replies,
                total_views: row.total_views,
                avg_likes: row.avg_likes,
            })
            .collect(),
        top_authors: authors
            .into_iter()
            .map(|row| AuthorItem {
                author_username: row.author_username,
                posts: row.posts,
                likes: row.likes,
                shares: row.shares,
                replies: row.replies,
                views: row.views,
            })
            .collect(),
        top_hashtags: hashtags
            .into_iter()
            .map(|row| HashtagCountItem {
                hashtag: row.hashtag,
                uses: row.uses,
            })
            .collect(),
        top_regions: regions
            .into_iter()
            .map(|row| RegionCountItem {
                region: row.region,
                post_count: row.post_count,
            })
            .collect(),
        processing,
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
