//! Read-model aggregation queries used by `smpdb-server` analytics endpoints.
//!
//! All rollups read the append-only result tables and the immutable posts
//! table, so they are safe to run concurrently with processing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// Post volume per platform with the collection window observed so far.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformSummaryRow {
    pub platform: String,
    pub posts: i64,
    pub first_collected_at: DateTime<Utc>,
    pub last_collected_at: DateTime<Utc>,
}

/// Sentiment distribution per platform.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SentimentByPlatformRow {
    pub platform: String,
    pub analyzed: i64,
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
    pub avg_score: Decimal,
}

/// One hashtag with its usage count.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopHashtagRow {
    pub hashtag: String,
    pub uses: i64,
}

/// One resolved region with the number of distinct posts mentioning it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopRegionRow {
    pub region: String,
    pub post_count: i64,
}

/// Engagement totals and averages per platform.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EngagementSummaryRow {
    pub platform: String,
    pub posts: i64,
    pub total_likes: i64,
    pub total_shares: i64,
    pub total_replies: i64,
    pub total_views: i64,
    pub avg_likes: Decimal,
}

/// Per-region rollup of location mentions within a time window.
///
/// Unresolved mentions roll up under the `unknown` region so the total
/// always accounts for every analyzed mention.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GeoRollupRow {
    pub region: String,
    pub mentions: i64,
    pub posts: i64,
    pub engagement: i64,
    pub with_coordinates: i64,
}

/// Engagement bucketed by hour or day.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TimeBucketRow {
    pub bucket: DateTime<Utc>,
    pub posts: i64,
    pub likes: i64,
    pub shares: i64,
    pub replies: i64,
    pub views: i64,
}

/// Engagement rolled up per author.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthorEngagementRow {
    pub author_username: String,
    pub posts: i64,
    pub likes: i64,
    pub shares: i64,
    pub replies: i64,
    pub views: i64,
}

/// Engagement rolled up per hashtag.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HashtagEngagementRow {
    pub hashtag: String,
    pub posts: i64,
    pub likes: i64,
    pub shares: i64,
    pub replies: i64,
    pub views: i64,
}

/// Post counts and collection window per platform.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn platform_summary(pool: &PgPool) -> Result<Vec<PlatformSummaryRow>, DbError> {
    let rows = sqlx::query_as::<_, PlatformSummaryRow>(
        "SELECT platform, \
                COUNT(*) AS posts, \
                MIN(collected_at) AS first_collected_at, \
                MAX(collected_at) AS last_collected_at \
         FROM posts \
         GROUP BY platform \
         ORDER BY platform ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Sentiment label distribution and mean score per platform.
///
/// Only analyzed posts contribute; platforms with no sentiment rows yet are
/// absent from the result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn sentiment_by_platform(pool: &PgPool) -> Result<Vec<SentimentByPlatformRow>, DbError> {
    let rows = sqlx::query_as::<_, SentimentByPlatformRow>(
        "SELECT p.platform, \
                COUNT(*) AS analyzed, \
                COUNT(*) FILTER (WHERE sr.label = 'positive') AS positive, \
                COUNT(*) FILTER (WHERE sr.label = 'negative') AS negative, \
                COUNT(*) FILTER (WHERE sr.label = 'neutral') AS neutral, \
                AVG(sr.score) AS avg_score \
         FROM sentiment_results sr \
         JOIN posts p ON p.id = sr.post_id \
         GROUP BY p.platform \
         ORDER BY p.platform ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// The most used hashtags, optionally restricted to one platform.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn top_hashtags(
    pool: &PgPool,
    platform: Option<&str>,
    limit: i64,
) -> Result<Vec<TopHashtagRow>, DbError> {
    let rows = sqlx::query_as::<_, TopHashtagRow>(
        "SELECT hashtag, COUNT(*) AS uses \
         FROM posts, UNNEST(hashtags) AS hashtag \
         WHERE ($1::TEXT IS NULL OR platform = $1) \
         GROUP BY hashtag \
         ORDER BY uses DESC, hashtag ASC \
         LIMIT $2",
    )
    .bind(platform)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Regions with the most distinct posts, from resolved location results.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn top_regions(pool: &PgPool, limit: i64) -> Result<Vec<TopRegionRow>, DbError> {
    let rows = sqlx::query_as::<_, TopRegionRow>(
        "SELECT region, COUNT(DISTINCT post_id) AS post_count \
         FROM location_results \
         WHERE region IS NOT NULL \
         GROUP BY region \
         ORDER BY post_count DESC, region ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Engagement totals and mean likes per platform.
///
/// Sums are cast back to `BIGINT` in SQL; Postgres widens `SUM(BIGINT)` to
/// `NUMERIC` otherwise.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn engagement_summary(pool: &PgPool) -> Result<Vec<EngagementSummaryRow>, DbError> {
    let rows = sqlx::query_as::<_, EngagementSummaryRow>(
        "SELECT platform, \
                COUNT(*) AS posts, \
                SUM(likes)::BIGINT AS total_likes, \
                SUM(shares)::BIGINT AS total_shares, \
                SUM(replies)::BIGINT AS total_replies, \
                SUM(views)::BIGINT AS total_views, \
                AVG(likes) AS avg_likes \
         FROM posts \
         GROUP BY platform \
         ORDER BY platform ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Location mentions rolled up by resolved region within `[from, to)`.
///
/// `engagement` sums likes + shares + replies across the distinct posts in
/// each region; `with_coordinates` counts mentions that resolved to a
/// coordinate pair.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn geo_rollup(
    pool: &PgPool,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<Vec<GeoRollupRow>, DbError> {
    // Engagement is summed over DISTINCT posts per region; a post mentioning
    // the same region several times contributes its counters once.
    let rows = sqlx::query_as::<_, GeoRollupRow>(
        "WITH mention AS (\
             SELECT COALESCE(lr.region, 'unknown') AS region, \
                    lr.post_id, \
                    (lr.latitude IS NOT NULL) AS has_coords \
             FROM location_results lr \
             JOIN posts p ON p.id = lr.post_id \
             WHERE ($1::timestamptz IS NULL OR p.collected_at >= $1) \
               AND ($2::timestamptz IS NULL OR p.collected_at < $2)\
         ), per_region AS (\
             SELECT region, \
                    COUNT(*) AS mentions, \
                    COUNT(DISTINCT post_id) AS posts, \
                    COUNT(*) FILTER (WHERE has_coords) AS with_coordinates \
             FROM mention \
             GROUP BY region\
         ), region_engagement AS (\
             SELECT dp.region, SUM(p.likes + p.shares + p.replies)::BIGINT AS engagement \
             FROM (SELECT DISTINCT region, post_id FROM mention) dp \
             JOIN posts p ON p.id = dp.post_id \
             GROUP BY dp.region\
         ) \
         SELECT pr.region, pr.mentions, pr.posts, \
                COALESCE(re.engagement, 0) AS engagement, \
                pr.with_coordinates \
         FROM per_region pr \
         LEFT JOIN region_engagement re USING (region) \
         ORDER BY pr.posts DESC, pr.region ASC",
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Post counts and engagement sums bucketed by `date_trunc` unit.
///
/// `bucket_unit` must be a unit `date_trunc` accepts; callers pass `hour`
/// or `day`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn engagement_over_time(
    pool: &PgPool,
    bucket_unit: &str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<Vec<TimeBucketRow>, DbError> {
    let rows = sqlx::query_as::<_, TimeBucketRow>(
        "SELECT date_trunc($1, collected_at) AS bucket, \
                COUNT(*) AS posts, \
                SUM(likes)::BIGINT AS likes, \
                SUM(shares)::BIGINT AS shares, \
                SUM(replies)::BIGINT AS replies, \
                SUM(views)::BIGINT AS views \
         FROM posts \
         WHERE ($2::timestamptz IS NULL OR collected_at >= $2) \
           AND ($3::timestamptz IS NULL OR collected_at < $3) \
         GROUP BY bucket \
         ORDER BY bucket ASC",
    )
    .bind(bucket_unit)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Engagement rolled up per author, most-engaged first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn engagement_by_author(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<AuthorEngagementRow>, DbError> {
    let rows = sqlx::query_as::<_, AuthorEngagementRow>(
        "SELECT author_username, \
                COUNT(*) AS posts, \
                SUM(likes)::BIGINT AS likes, \
                SUM(shares)::BIGINT AS shares, \
                SUM(replies)::BIGINT AS replies, \
                SUM(views)::BIGINT AS views \
         FROM posts \
         GROUP BY author_username \
         ORDER BY SUM(likes + shares + replies) DESC, author_username ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Engagement rolled up per hashtag, most-engaged first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn engagement_by_hashtag(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<HashtagEngagementRow>, DbError> {
    let rows = sqlx::query_as::<_, HashtagEngagementRow>(
        "SELECT hashtag, \
                COUNT(*) AS posts, \
                SUM(likes)::BIGINT AS likes, \
                SUM(shares)::BIGINT AS shares, \
                SUM(replies)::BIGINT AS replies, \
                SUM(views)::BIGINT AS views \
         FROM posts, UNNEST(hashtags) AS hashtag \
         GROUP BY hashtag \
         ORDER BY SUM(likes + shares + replies) DESC, hashtag ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
