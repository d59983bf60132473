//! Row types and reads for the capability result tables.
//!
//! Inserts into these tables happen inside the status-flip transactions in
//! [`crate::processing`]; this module owns the input/row shapes and the
//! read paths used by the API.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Sentiment analysis output ready for persistence.
#[derive(Debug, Clone)]
pub struct NewSentiment {
    pub label: String,
    /// Score in [-1.000, 1.000], bound to `NUMERIC(6,3)`.
    pub score: Decimal,
    /// Confidence in [0.0000, 1.0000], bound to `NUMERIC(5,4)`.
    pub confidence: Decimal,
    pub model: String,
}

/// One extracted location mention, after gazetteer resolution.
#[derive(Debug, Clone)]
pub struct NewLocation {
    pub location_text: String,
    pub location_type: String,
    pub confidence: Decimal,
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// How the mention was resolved: `exact`, `fuzzy`, or `unresolved`.
    pub resolution: String,
    pub model: String,
}

/// One extracted named entity.
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub entity_text: String,
    pub entity_type: String,
    pub confidence: Decimal,
    pub model: String,
}

/// One extracted keyword with its relevance score.
#[derive(Debug, Clone)]
pub struct NewKeyword {
    pub keyword: String,
    pub score: Decimal,
    pub model: String,
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `sentiment_results` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SentimentResultRow {
    pub id: i64,
    pub post_id: i64,
    pub label: String,
    pub score: Decimal,
    pub confidence: Decimal,
    pub model: String,
    pub analyzed_at: DateTime<Utc>,
}

/// A row from the `location_results` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LocationResultRow {
    pub id: i64,
    pub post_id: i64,
    pub location_text: String,
    pub location_type: String,
    pub confidence: Decimal,
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub resolution: String,
    pub model: String,
    pub analyzed_at: DateTime<Utc>,
}

/// A row from the `entity_results` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntityResultRow {
    pub id: i64,
    pub post_id: i64,
    pub entity_text: String,
    pub entity_type: String,
    pub confidence: Decimal,
    pub model: String,
    pub analyzed_at: DateTime<Utc>,
}

/// A row from the `keyword_results` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KeywordResultRow {
    pub id: i64,
    pub post_id: i64,
    pub keyword: String,
    pub score: Decimal,
    pub model: String,
    pub analyzed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// List sentiment rows for one post, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sentiment_for_post(
    pool: &PgPool,
    post_id: i64,
) -> Result<Vec<SentimentResultRow>, DbError> {
    let rows = sqlx::query_as::<_, SentimentResultRow>(
        "SELECT id, post_id, label, score, confidence, model, analyzed_at \
         FROM sentiment_results \
         WHERE post_id = $1 \
         ORDER BY analyzed_at DESC, id DESC",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// List location rows for one post, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_locations_for_post(
    pool: &PgPool,
    post_id: i64,
) -> Result<Vec<LocationResultRow>, DbError> {
    let rows = sqlx::query_as::<_, LocationResultRow>(
        "SELECT id, post_id, location_text, location_type, confidence, region, \
                country, latitude, longitude, resolution, model, analyzed_at \
         FROM location_results \
         WHERE post_id = $1 \
         ORDER BY analyzed_at DESC, id DESC",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// List entity rows for one post, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_entities_for_post(
    pool: &PgPool,
    post_id: i64,
) -> Result<Vec<EntityResultRow>, DbError> {
    let rows = sqlx::query_as::<_, EntityResultRow>(
        "SELECT id, post_id, entity_text, entity_type, confidence, model, analyzed_at \
         FROM entity_results \
         WHERE post_id = $1 \
         ORDER BY analyzed_at DESC, id DESC",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// List keyword rows for one post, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_keywords_for_post(
    pool: &PgPool,
    post_id: i64,
) -> Result<Vec<KeywordResultRow>, DbError> {
    let rows = sqlx::query_as::<_, KeywordResultRow>(
        "SELECT id, post_id, keyword, score, model, analyzed_at \
         FROM keyword_results \
         WHERE post_id = $1 \
         ORDER BY analyzed_at DESC, id DESC",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
