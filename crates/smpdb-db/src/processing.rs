//! The incremental processing ledger.
//!
//! Every post carries one `processing_status` row per capability. Workers
//! select unprocessed rows, run the analysis, and flip the row inside the
//! same transaction that writes the result rows. The flip is guarded
//! (`WHERE processed = FALSE`), so two workers racing on the same post
//! produce exactly one set of results; the loser sees
//! [`DbError::AlreadyProcessed`] and its writes roll back.
//!
//! There is no persisted "in progress" state. A crash mid-analysis leaves
//! the row unprocessed and the next pass picks it up again.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use smpdb_core::Capability;

use crate::results::{NewEntity, NewKeyword, NewLocation, NewSentiment};
use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A raw row from the `processing_status` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessingStatusRow {
    pub id: i64,
    pub post_id: i64,
    pub capability: String,
    pub processed: bool,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A failed attempt surfaced to operators, joined with its post's platform.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecentFailureRow {
    pub post_id: i64,
    pub platform: String,
    pub capability: String,
    pub retry_count: i32,
    /// `true` when the retry budget is exhausted and the row was skipped.
    pub processed: bool,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// A post joined with its pending status row, as handed to a worker.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingPostRow {
    pub post_id: i64,
    pub platform: String,
    pub content: String,
    pub geo_hint: Option<String>,
    pub hashtags: Vec<String>,
    pub retry_count: i32,
    pub collected_at: DateTime<Utc>,
}

/// Per-capability rollup of the processing ledger.
///
/// `processed` counts successful analyses only; rows given up on after
/// repeated failures land in `skipped` (`processed = TRUE` with a retained
/// `last_error`).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessingProgressRow {
    pub capability: String,
    pub total: i64,
    pub processed: i64,
    pub pending: i64,
    pub skipped: i64,
}

/// Per-platform, per-capability rollup of the processing ledger.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessingStatsRow {
    pub platform: String,
    pub capability: String,
    pub total: i64,
    pub processed: i64,
    pub pending: i64,
    pub skipped: i64,
}

/// Outcome of recording a failed analysis attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The post stays eligible for the next processing pass.
    WillRetry { retry_count: i32 },
    /// The retry budget is exhausted; the row is skipped permanently and
    /// will not be selected again.
    SkippedPermanently { retry_count: i32 },
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Select up to `batch_size` posts still awaiting the given capability.
///
/// Ordered oldest-collected first (ties broken by id) so a backlog drains
/// fairly instead of newest posts starving old ones. Rows whose
/// `retry_count` has already reached `max_retries` are excluded even if a
/// concurrent failure path has not flipped them yet.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_unprocessed(
    pool: &PgPool,
    capability: Capability,
    batch_size: i64,
    max_retries: i32,
) -> Result<Vec<PendingPostRow>, DbError> {
    let rows = sqlx::query_as::<_, PendingPostRow>(
        "SELECT p.id AS post_id, p.platform, p.content, p.geo_hint, p.hashtags, \
                ps.retry_count, p.collected_at \
         FROM processing_status ps \
         JOIN posts p ON p.id = ps.post_id \
         WHERE ps.capability = $1 \
           AND ps.processed = FALSE \
           AND ps.retry_count < $2 \
         ORDER BY p.collected_at ASC, p.id ASC \
         LIMIT $3",
    )
    .bind(capability.as_str())
    .bind(max_retries)
    .bind(batch_size)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetch all status rows for one post, in capability order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_status_for_post(
    pool: &PgPool,
    post_id: i64,
) -> Result<Vec<ProcessingStatusRow>, DbError> {
    let rows = sqlx::query_as::<_, ProcessingStatusRow>(
        "SELECT id, post_id, capability, processed, retry_count, last_error, \
                last_attempt_at, processed_at, created_at \
         FROM processing_status \
         WHERE post_id = $1 \
         ORDER BY capability ASC",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Status flips
// ---------------------------------------------------------------------------

/// Flip the status row for `(post_id, capability)` to processed, clearing
/// any error from earlier attempts. Must run inside the same transaction as
/// the result inserts.
async fn flip_status(
    tx: &mut Transaction<'_, Postgres>,
    post_id: i64,
    capability: Capability,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE processing_status \
         SET processed = TRUE, processed_at = NOW(), last_error = NULL \
         WHERE post_id = $1 AND capability = $2 AND processed = FALSE",
    )
    .bind(post_id)
    .bind(capability.as_str())
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::AlreadyProcessed {
            post_id,
            capability: capability.as_str().to_string(),
        });
    }

    Ok(())
}

/// Persist a sentiment result and mark the post's sentiment status processed.
///
/// Result row and status flip commit atomically; if another worker already
/// processed this post the insert rolls back and nothing is written.
///
/// # Errors
///
/// Returns [`DbError::AlreadyProcessed`] if the status row was no longer
/// unprocessed, or [`DbError::Sqlx`] on query failure.
pub async fn mark_sentiment_processed(
    pool: &PgPool,
    post_id: i64,
    sentiment: &NewSentiment,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO sentiment_results (post_id, label, score, confidence, model) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(post_id)
    .bind(&sentiment.label)
    .bind(sentiment.score)
    .bind(sentiment.confidence)
    .bind(&sentiment.model)
    .execute(&mut *tx)
    .await?;

    match flip_status(&mut tx, post_id, Capability::Sentiment).await {
        Ok(()) => {
            tx.commit().await?;
            Ok(())
        }
        Err(e) => {
            tx.rollback().await?;
            Err(e)
        }
    }
}

/// Persist extracted locations and mark the post's location status processed.
///
/// A successful analysis may yield zero locations; the status still flips
/// and no result rows are written.
///
/// # Errors
///
/// Returns [`DbError::AlreadyProcessed`] if the status row was no longer
/// unprocessed, or [`DbError::Sqlx`] on query failure.
pub async fn mark_locations_processed(
    pool: &PgPool,
    post_id: i64,
    locations: &[NewLocation],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    if !locations.is_empty() {
        let mut texts: Vec<String> = Vec::with_capacity(locations.len());
        let mut types: Vec<String> = Vec::with_capacity(locations.len());
        let mut confidences: Vec<rust_decimal::Decimal> = Vec::with_capacity(locations.len());
        let mut regions: Vec<Option<String>> = Vec::with_capacity(locations.len());
        let mut countries: Vec<Option<String>> = Vec::with_capacity(locations.len());
        let mut latitudes: Vec<Option<f64>> = Vec::with_capacity(locations.len());
        let mut longitudes: Vec<Option<f64>> = Vec::with_capacity(locations.len());
        let mut resolutions: Vec<String> = Vec::with_capacity(locations.len());
        let mut models: Vec<String> = Vec::with_capacity(locations.len());

        for loc in locations {
            texts.push(loc.location_text.clone());
            types.push(loc.location_type.clone());
            confidences.push(loc.confidence);
            regions.push(loc.region.clone());
            countries.push(loc.country.clone());
            latitudes.push(loc.latitude);
            longitudes.push(loc.longitude);
            resolutions.push(loc.resolution.clone());
            models.push(loc.model.clone());
        }

        sqlx::query(
            "INSERT INTO location_results \
                 (post_id, location_text, location_type, confidence, region, \
                  country, latitude, longitude, resolution, model) \
             SELECT $1, * FROM UNNEST(\
                 $2::text[], $3::text[], $4::numeric[], $5::text[], $6::text[], \
                 $7::float8[], $8::float8[], $9::text[], $10::text[])",
        )
        .bind(post_id)
        .bind(&texts)
        .bind(&types)
        .bind(&confidences)
        .bind(&regions)
        .bind(&countries)
        .bind(&latitudes)
        .bind(&longitudes)
        .bind(&resolutions)
        .bind(&models)
        .execute(&mut *tx)
        .await?;
    }

    match flip_status(&mut tx, post_id, Capability::Location).await {
        Ok(()) => {
            tx.commit().await?;
            Ok(())
        }
        Err(e) => {
            tx.rollback().await?;
            Err(e)
        }
    }
}

/// Persist extracted entities and mark the post's entity status processed.
///
/// # Errors
///
/// Returns [`DbError::AlreadyProcessed`] if the status row was no longer
/// unprocessed, or [`DbError::Sqlx`] on query failure.
pub async fn mark_entities_processed(
    pool: &PgPool,
    post_id: i64,
    entities: &[NewEntity],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    if !entities.is_empty() {
        let mut texts: Vec<String> = Vec::with_capacity(entities.len());
        let mut types: Vec<String> = Vec::with_capacity(entities.len());
        let mut confidences: Vec<rust_decimal::Decimal> = Vec::with_capacity(entities.len());
        let mut models: Vec<String> = Vec::with_capacity(entities.len());

        for entity in entities {
            texts.push(entity.entity_text.clone());
            types.push(entity.entity_type.clone());
            confidences.push(entity.confidence);
            models.push(entity.model.clone());
        }

        sqlx::query(
            "INSERT INTO entity_results (post_id, entity_text, entity_type, confidence, model) \
             SELECT $1, * FROM UNNEST($2::text[], $3::text[], $4::numeric[], $5::text[])",
        )
        .bind(post_id)
        .bind(&texts)
        .bind(&types)
        .bind(&confidences)
        .bind(&models)
        .execute(&mut *tx)
        .await?;
    }

    match flip_status(&mut tx, post_id, Capability::Entity).await {
        Ok(()) => {
            tx.commit().await?;
            Ok(())
        }
        Err(e) => {
            tx.rollback().await?;
            Err(e)
        }
    }
}

/// Persist extracted keywords and mark the post's keyword status processed.
///
/// # Errors
///
/// Returns [`DbError::AlreadyProcessed`] if the status row was no longer
/// unprocessed, or [`DbError::Sqlx`] on query failure.
pub async fn mark_keywords_processed(
    pool: &PgPool,
    post_id: i64,
    keywords: &[NewKeyword],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    if !keywords.is_empty() {
        let mut words: Vec<String> = Vec::with_capacity(keywords.len());
        let mut scores: Vec<rust_decimal::Decimal> = Vec::with_capacity(keywords.len());
        let mut models: Vec<String> = Vec::with_capacity(keywords.len());

        for keyword in keywords {
            words.push(keyword.keyword.clone());
            scores.push(keyword.score);
            models.push(keyword.model.clone());
        }

        sqlx::query(
            "INSERT INTO keyword_results (post_id, keyword, score, model) \
             SELECT $1, * FROM UNNEST($2::text[], $3::numeric[], $4::text[])",
        )
        .bind(post_id)
        .bind(&words)
        .bind(&scores)
        .bind(&models)
        .execute(&mut *tx)
        .await?;
    }

    match flip_status(&mut tx, post_id, Capability::Keyword).await {
        Ok(()) => {
            tx.commit().await?;
            Ok(())
        }
        Err(e) => {
            tx.rollback().await?;
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Failure path
// ---------------------------------------------------------------------------

/// Record a failed analysis attempt for `(post_id, capability)`.
///
/// Increments `retry_count` and stores the error text. Once the count
/// reaches `max_retries` the row is flipped to processed with the error
/// retained, permanently skipping the post for this capability so one
/// poison post cannot wedge the pipeline.
///
/// # Errors
///
/// Returns [`DbError::AlreadyProcessed`] if the status row was no longer
/// unprocessed, or [`DbError::Sqlx`] on query failure.
pub async fn mark_failed(
    pool: &PgPool,
    post_id: i64,
    capability: Capability,
    error: &str,
    max_retries: i32,
) -> Result<FailureOutcome, DbError> {
    let row: Option<(i32, bool)> = sqlx::query_as(
        "UPDATE processing_status \
         SET retry_count = retry_count + 1, \
             last_error = $3, \
             last_attempt_at = NOW(), \
             processed = (retry_count + 1 >= $4), \
             processed_at = CASE WHEN retry_count + 1 >= $4 THEN NOW() ELSE processed_at END \
         WHERE post_id = $1 AND capability = $2 AND processed = FALSE \
         RETURNING retry_count, processed",
    )
    .bind(post_id)
    .bind(capability.as_str())
    .bind(error)
    .bind(max_retries)
    .fetch_optional(pool)
    .await?;

    let Some((retry_count, skipped)) = row else {
        return Err(DbError::AlreadyProcessed {
            post_id,
            capability: capability.as_str().to_string(),
        });
    };

    if skipped {
        Ok(FailureOutcome::SkippedPermanently { retry_count })
    } else {
        Ok(FailureOutcome::WillRetry { retry_count })
    }
}

// ---------------------------------------------------------------------------
// Rollups
// ---------------------------------------------------------------------------

/// Per-capability counts of processed / pending / skipped rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_processing_progress(pool: &PgPool) -> Result<Vec<ProcessingProgressRow>, DbError> {
    let rows = sqlx::query_as::<_, ProcessingProgressRow>(
        "SELECT capability, \
                COUNT(*) AS total, \
                COUNT(*) FILTER (WHERE processed AND last_error IS NULL) AS processed, \
                COUNT(*) FILTER (WHERE NOT processed) AS pending, \
                COUNT(*) FILTER (WHERE processed AND last_error IS NOT NULL) AS skipped \
         FROM processing_status \
         GROUP BY capability \
         ORDER BY capability ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Per-platform, per-capability counts of processed / pending / skipped rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn processing_stats(pool: &PgPool) -> Result<Vec<ProcessingStatsRow>, DbError> {
    let rows = sqlx::query_as::<_, ProcessingStatsRow>(
        "SELECT p.platform, \
                ps.capability, \
                COUNT(*) AS total, \
                COUNT(*) FILTER (WHERE ps.processed AND ps.last_error IS NULL) AS processed, \
                COUNT(*) FILTER (WHERE NOT ps.processed) AS pending, \
                COUNT(*) FILTER (WHERE ps.processed AND ps.last_error IS NOT NULL) AS skipped \
         FROM processing_status ps \
         JOIN posts p ON p.id = ps.post_id \
         GROUP BY p.platform, ps.capability \
         ORDER BY p.platform ASC, ps.capability ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Most recent failed attempts across all capabilities, newest first.
///
/// Rows that later succeeded drop out (the success flip clears
/// `last_error`); mid-retry and permanently-skipped rows both appear.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn recent_failures(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<RecentFailureRow>, DbError> {
    let rows = sqlx::query_as::<_, RecentFailureRow>(
        "SELECT ps.post_id, p.platform, ps.capability, ps.retry_count, \
                ps.processed, ps.last_error, ps.last_attempt_at \
         FROM processing_status ps \
         JOIN posts p ON p.id = ps.post_id \
         WHERE ps.last_error IS NOT NULL \
         ORDER BY ps.last_attempt_at DESC NULLS LAST, ps.id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
