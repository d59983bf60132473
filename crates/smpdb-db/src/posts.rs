//! Database operations for the `posts` table and the ingestion gate.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use smpdb_core::{Capability, NewPost};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub platform: String,
    pub source_id: String,
    pub author_username: String,
    pub author_display_name: Option<String>,
    pub author_follower_count: i64,
    pub author_verified: bool,
    pub content: String,
    pub media_urls: Vec<String>,
    pub media_types: Vec<String>,
    pub likes: i64,
    pub shares: i64,
    pub replies: i64,
    pub views: i64,
    pub quotes: i64,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub is_retweet: bool,
    pub is_quote: bool,
    pub is_reply: bool,
    pub posted_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
    pub geo_hint: Option<String>,
    pub raw_payload: Value,
    pub created_at: DateTime<Utc>,
}

const POST_COLUMNS: &str = "id, platform, source_id, author_username, author_display_name, \
     author_follower_count, author_verified, content, media_urls, media_types, \
     likes, shares, replies, views, quotes, hashtags, mentions, \
     is_retweet, is_quote, is_reply, posted_at, collected_at, geo_hint, \
     raw_payload, created_at";

/// Outcome of pushing one canonical post through the ingestion gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The post was new; carries its generated id.
    Inserted(i64),
    /// A row with the same `(platform, source_id)` already existed; nothing
    /// was written.
    Duplicate,
}

/// Input filters for post listing.
#[derive(Debug, Clone, Default)]
pub struct PostFilters<'a> {
    pub platform: Option<&'a str>,
    pub author_username: Option<&'a str>,
    pub hashtag: Option<&'a str>,
    /// Keep only posts with at least one sentiment result carrying this label.
    pub sentiment: Option<&'a str>,
    pub collected_from: Option<DateTime<Utc>>,
    pub collected_to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

// ---------------------------------------------------------------------------
// Ingestion gate
// ---------------------------------------------------------------------------

/// Insert one canonical post, or do nothing if `(platform, source_id)` is
/// already present.
///
/// The uniqueness check and the insert are a single statement; concurrent
/// ingesters racing on the same post cannot both win. On first insert the
/// full fan-out of `processing_status` rows (one per capability, all
/// unprocessed) is created in the same transaction, so a post is never
/// observable without its status ledger.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails for any reason other than
/// the uniqueness conflict.
pub async fn insert_post(pool: &PgPool, post: &NewPost) -> Result<InsertOutcome, DbError> {
    let mut tx = pool.begin().await?;

    let inserted_id: Option<i64> = sqlx::query_scalar(
        "INSERT INTO posts \
             (platform, source_id, author_username, author_display_name, \
              author_follower_count, author_verified, content, media_urls, \
              media_types, likes, shares, replies, views, quotes, hashtags, \
              mentions, is_retweet, is_quote, is_reply, posted_at, collected_at, \
              geo_hint, raw_payload) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, \
                 $15, $16, $17, $18, $19, $20, $21, $22, $23) \
         ON CONFLICT (platform, source_id) DO NOTHING \
         RETURNING id",
    )
    .bind(post.platform.as_str())
    .bind(&post.source_id)
    .bind(&post.author.username)
    .bind(&post.author.display_name)
    .bind(post.author.follower_count)
    .bind(post.author.verified)
    .bind(&post.content)
    .bind(&post.media_urls)
    .bind(&post.media_types)
    .bind(post.engagement.likes)
    .bind(post.engagement.shares)
    .bind(post.engagement.replies)
    .bind(post.engagement.views)
    .bind(post.engagement.quotes)
    .bind(&post.hashtags)
    .bind(&post.mentions)
    .bind(post.is_retweet)
    .bind(post.is_quote)
    .bind(post.is_reply)
    .bind(post.posted_at)
    .bind(post.collected_at)
    .bind(&post.geo_hint)
    .bind(&post.raw_payload)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(post_id) = inserted_id else {
        tx.rollback().await?;
        return Ok(InsertOutcome::Duplicate);
    };

    let capabilities: Vec<String> = Capability::ALL
        .iter()
        .map(|c| c.as_str().to_string())
        .collect();

    sqlx::query(
        "INSERT INTO processing_status (post_id, capability) \
         SELECT $1, * FROM UNNEST($2::text[])",
    )
    .bind(post_id)
    .bind(&capabilities)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(InsertOutcome::Inserted(post_id))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Fetch a single post by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_post(pool: &PgPool, id: i64) -> Result<PostRow, DbError> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
    let row = sqlx::query_as::<_, PostRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Fetch a post by its provider-native identity, or `None` if not ingested.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_post_by_source(
    pool: &PgPool,
    platform: &str,
    source_id: &str,
) -> Result<Option<PostRow>, DbError> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE platform = $1 AND source_id = $2");
    let row = sqlx::query_as::<_, PostRow>(&sql)
        .bind(platform)
        .bind(source_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// List posts matching the filters, newest collected first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_posts(pool: &PgPool, filters: PostFilters<'_>) -> Result<Vec<PostRow>, DbError> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts \
         WHERE ($1::TEXT IS NULL OR platform = $1) \
           AND ($2::TEXT IS NULL OR author_username = $2) \
           AND ($3::TEXT IS NULL OR $3 = ANY(hashtags)) \
           AND ($4::TEXT IS NULL OR EXISTS (\
                SELECT 1 FROM sentiment_results sr \
                WHERE sr.post_id = posts.id AND sr.label = $4)) \
           AND ($5::timestamptz IS NULL OR collected_at >= $5) \
           AND ($6::timestamptz IS NULL OR collected_at <= $6) \
         ORDER BY collected_at DESC, id DESC \
         LIMIT $7 OFFSET $8"
    );
    let rows = sqlx::query_as::<_, PostRow>(&sql)
        .bind(filters.platform)
        .bind(filters.author_username)
        .bind(filters.hashtag)
        .bind(filters.sentiment)
        .bind(filters.collected_from)
        .bind(filters.collected_to)
        .bind(filters.limit)
        .bind(filters.offset)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Count all posts, optionally restricted to one platform.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_posts(pool: &PgPool, platform: Option<&str>) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM posts WHERE ($1::TEXT IS NULL OR platform = $1)",
    )
    .bind(platform)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
