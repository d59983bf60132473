//! Per-capability batch processing over the unprocessed backlog.
//!
//! Capabilities run one at a time in a fixed order; inside a capability,
//! posts are analyzed with bounded concurrency and each post's outcome is
//! committed independently. A post that keeps failing burns through its
//! retry budget across pulls and ends as a permanent skip, so one poison
//! post can never wedge the loop.

use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use smpdb_analyzer::{AnalyzerClient, AnalyzerError};
use smpdb_core::{AppConfig, Capability};
use smpdb_db::{
    DbError, FailureOutcome, NewEntity, NewKeyword, NewLocation, NewSentiment, PendingPostRow,
};
use smpdb_geo::Gazetteer;

use crate::{fail_run_best_effort, PipelineError};

/// Knobs for one processing run. `capability: None` drains all
/// capabilities in [`Capability::ALL`] order.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    pub batch_size: i64,
    pub max_retries: i32,
    pub concurrency: usize,
    pub capability: Option<Capability>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_retries: 3,
            concurrency: 4,
            capability: None,
        }
    }
}

impl ProcessOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.process_batch_size,
            max_retries: config.process_max_retries,
            concurrency: config.process_concurrency,
            capability: None,
        }
    }
}

/// Counts for one capability within a run. `selected` sums rows across
/// pulls, so a post that fails and is retried in a later pull counts once
/// per attempt; `processed`/`failed`/`skipped` count committed outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRunReport {
    pub capability: Capability,
    pub selected: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// A processing run's per-capability reports plus the public id of its
/// `pipeline_runs` row.
#[derive(Debug, Clone)]
pub struct ProcessingReport {
    pub run_public_id: Uuid,
    pub reports: Vec<CapabilityRunReport>,
}

impl ProcessingReport {
    #[must_use]
    pub fn total_processed(&self) -> usize {
        self.reports.iter().map(|r| r.processed).sum()
    }
}

enum PostOutcome {
    Processed,
    Failed,
    Skipped,
    StoreError(DbError),
}

enum CommitError {
    Analyzer(AnalyzerError),
    Db(DbError),
}

impl From<AnalyzerError> for CommitError {
    fn from(e: AnalyzerError) -> Self {
        CommitError::Analyzer(e)
    }
}

impl From<DbError> for CommitError {
    fn from(e: DbError) -> Self {
        CommitError::Db(e)
    }
}

/// Drain one capability's backlog: pull a batch, analyze with bounded
/// concurrency, commit each post independently, repeat until a pull comes
/// back empty. Re-running against an empty backlog is a no-op.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] on a store-level failure; per-post
/// analyzer failures are recorded in the tracker and never abort the loop.
pub async fn process_capability(
    pool: &PgPool,
    analyzer: &AnalyzerClient,
    gazetteer: &Gazetteer,
    capability: Capability,
    options: &ProcessOptions,
) -> Result<CapabilityRunReport, PipelineError> {
    let mut report = CapabilityRunReport {
        capability,
        selected: 0,
        processed: 0,
        failed: 0,
        skipped: 0,
    };
    let concurrency = options.concurrency.max(1);

    loop {
        let batch =
            smpdb_db::get_unprocessed(pool, capability, options.batch_size, options.max_retries)
                .await?;
        if batch.is_empty() {
            break;
        }
        report.selected += batch.len();

        // Futures are built eagerly (inert until polled) rather than via a
        // lazy stream map: holding a borrowing closure across the await
        // trips rustc's higher-ranked lifetime check once the caller's
        // future is boxed as `dyn Future + Send` (rust-lang/rust#102211).
        let post_futures: Vec<_> = batch
            .iter()
            .map(|post| process_post(pool, analyzer, gazetteer, capability, post, options.max_retries))
            .collect();
        let outcomes: Vec<PostOutcome> = stream::iter(post_futures)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                PostOutcome::Processed => report.processed += 1,
                PostOutcome::Failed => report.failed += 1,
                PostOutcome::Skipped => report.skipped += 1,
                PostOutcome::StoreError(e) => return Err(e.into()),
            }
        }
    }

    tracing::info!(
        capability = %capability,
        selected = report.selected,
        processed = report.processed,
        failed = report.failed,
        skipped = report.skipped,
        "capability backlog drained"
    );

    Ok(report)
}

/// [`process_capability`] over the selected capabilities, wrapped in
/// `pipeline_runs` bookkeeping (create → start → work → complete/fail).
///
/// # Errors
///
/// Returns [`PipelineError`] when run bookkeeping or the store fails; the
/// run row is marked failed best-effort first. Work committed before the
/// abort stays committed and the next run resumes from the backlog.
pub async fn run_processing(
    pool: &PgPool,
    analyzer: &AnalyzerClient,
    gazetteer: &Gazetteer,
    options: &ProcessOptions,
    trigger_source: &str,
) -> Result<ProcessingReport, PipelineError> {
    let run = smpdb_db::create_pipeline_run(pool, "processing", trigger_source).await?;
    if let Err(e) = smpdb_db::start_pipeline_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, "processing", e.to_string()).await;
        return Err(e.into());
    }

    let capabilities: Vec<Capability> = match options.capability {
        Some(capability) => vec![capability],
        None => Capability::ALL.to_vec(),
    };

    let mut reports = Vec::with_capacity(capabilities.len());
    for capability in capabilities {
        match process_capability(pool, analyzer, gazetteer, capability, options).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                fail_run_best_effort(pool, run.id, "processing", e.to_string()).await;
                return Err(e);
            }
        }
    }

    let total_processed: usize = reports.iter().map(|r| r.processed).sum();
    let records = i32::try_from(total_processed).unwrap_or(i32::MAX);
    let detail = serde_json::to_value(&reports)?;
    if let Err(e) = smpdb_db::complete_pipeline_run(pool, run.id, records, Some(detail)).await {
        fail_run_best_effort(pool, run.id, "processing", e.to_string()).await;
        return Err(e.into());
    }

    Ok(ProcessingReport {
        run_public_id: run.public_id,
        reports,
    })
}

/// Analyze one post for one capability and commit the outcome. Lost races
/// surface as `AlreadyProcessed` and count as processed; the work exists,
/// it just wasn't ours.
async fn process_post(
    pool: &PgPool,
    analyzer: &AnalyzerClient,
    gazetteer: &Gazetteer,
    capability: Capability,
    post: &PendingPostRow,
    max_retries: i32,
) -> PostOutcome {
    let commit = match capability {
        Capability::Sentiment => commit_sentiment(pool, analyzer, post).await,
        Capability::Location => commit_locations(pool, analyzer, gazetteer, post).await,
        Capability::Entity => commit_entities(pool, analyzer, post).await,
        Capability::Keyword => commit_keywords(pool, analyzer, post).await,
    };

    match commit {
        Ok(()) => PostOutcome::Processed,
        Err(CommitError::Analyzer(e)) => record_failure(pool, post, capability, &e, max_retries).await,
        Err(CommitError::Db(DbError::AlreadyProcessed { .. })) => {
            tracing::debug!(
                post_id = post.post_id,
                capability = %capability,
                "already processed by a concurrent worker"
            );
            PostOutcome::Processed
        }
        Err(CommitError::Db(e)) => PostOutcome::StoreError(e),
    }
}

async fn commit_sentiment(
    pool: &PgPool,
    analyzer: &AnalyzerClient,
    post: &PendingPostRow,
) -> Result<(), CommitError> {
    let analysis = analyzer.analyze_sentiment(&post.content).await?;
    let sentiment = NewSentiment {
        label: analysis.label,
        score: to_decimal(analysis.score, 3),
        confidence: to_decimal(analysis.confidence, 4),
        model: analysis.model,
    };
    smpdb_db::mark_sentiment_processed(pool, post.post_id, &sentiment).await?;
    Ok(())
}

/// Location commits pipe every mention through the gazetteer so the stored
/// row always carries a region classification. Resolution candidates in
/// priority order: the mention itself, the post's geo hint, its hashtags.
async fn commit_locations(
    pool: &PgPool,
    analyzer: &AnalyzerClient,
    gazetteer: &Gazetteer,
    post: &PendingPostRow,
) -> Result<(), CommitError> {
    let analysis = analyzer.extract_locations(&post.content).await?;

    let locations: Vec<NewLocation> = analysis
        .locations
        .iter()
        .map(|mention| {
            let mut candidates: Vec<&str> = vec![mention.text.as_str()];
            if let Some(hint) = post.geo_hint.as_deref() {
                candidates.push(hint);
            }
            candidates.extend(post.hashtags.iter().map(String::as_str));

            let resolution = gazetteer.resolve(&candidates);
            NewLocation {
                location_text: mention.text.clone(),
                location_type: mention.kind.clone(),
                confidence: to_decimal(mention.confidence, 4),
                region: Some(resolution.region),
                country: resolution.country,
                latitude: resolution.latitude,
                longitude: resolution.longitude,
                resolution: resolution.method.as_str().to_string(),
                model: analysis.model.clone(),
            }
        })
        .collect();

    smpdb_db::mark_locations_processed(pool, post.post_id, &locations).await?;
    Ok(())
}

async fn commit_entities(
    pool: &PgPool,
    analyzer: &AnalyzerClient,
    post: &PendingPostRow,
) -> Result<(), CommitError> {
    let analysis = analyzer.extract_entities(&post.content).await?;
    let entities: Vec<NewEntity> = analysis
        .entities
        .iter()
        .map(|mention| NewEntity {
            entity_text: mention.text.clone(),
            entity_type: mention.kind.clone(),
            confidence: to_decimal(mention.confidence, 4),
            model: analysis.model.clone(),
        })
        .collect();
    smpdb_db::mark_entities_processed(pool, post.post_id, &entities).await?;
    Ok(())
}

async fn commit_keywords(
    pool: &PgPool,
    analyzer: &AnalyzerClient,
    post: &PendingPostRow,
) -> Result<(), CommitError> {
    let analysis = analyzer.extract_keywords(&post.content).await?;
    let keywords: Vec<NewKeyword> = analysis
        .keywords
        .iter()
        .map(|hit| NewKeyword {
            keyword: hit.keyword.clone(),
            score: to_decimal(hit.score, 4),
            model: analysis.model.clone(),
        })
        .collect();
    smpdb_db::mark_keywords_processed(pool, post.post_id, &keywords).await?;
    Ok(())
}

async fn record_failure(
    pool: &PgPool,
    post: &PendingPostRow,
    capability: Capability,
    error: &AnalyzerError,
    max_retries: i32,
) -> PostOutcome {
    tracing::warn!(
        post_id = post.post_id,
        capability = %capability,
        error = %error,
        "analysis failed"
    );

    match smpdb_db::mark_failed(pool, post.post_id, capability, &error.to_string(), max_retries)
        .await
    {
        Ok(FailureOutcome::WillRetry { retry_count }) => {
            tracing::debug!(post_id = post.post_id, retry_count, "will retry");
            PostOutcome::Failed
        }
        Ok(FailureOutcome::SkippedPermanently { retry_count }) => {
            tracing::warn!(
                post_id = post.post_id,
                capability = %capability,
                retry_count,
                "retry budget exhausted, permanently skipping post for this capability"
            );
            PostOutcome::Skipped
        }
        Err(DbError::AlreadyProcessed { .. }) => PostOutcome::Processed,
        Err(e) => PostOutcome::StoreError(e),
    }
}

/// Wire scores arrive as floats; result columns are fixed-scale NUMERIC.
fn to_decimal(value: f64, scale: u32) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or_default()
        .round_dp(scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_matches_config_defaults() {
        let options = ProcessOptions::default();
        assert_eq!(options.batch_size, 100);
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.concurrency, 4);
        assert!(options.capability.is_none());
    }

    #[test]
    fn options_from_app_config_copies_knobs() {
        let config = AppConfig {
            database_url: "postgres://localhost/smpdb".to_string(),
            env: smpdb_core::Environment::Development,
            bind_addr: "127.0.0.1:3000".parse().unwrap(),
            log_level: "info".to_string(),
            gazetteer_path: "./config/gazetteer.yaml".into(),
            analyzer_url: "http://localhost:8100".to_string(),
            analyzer_api_key: None,
            analyzer_timeout_secs: 10,
            analyzer_max_retries: 2,
            analyzer_backoff_base_ms: 500,
            db_max_connections: 10,
            db_min_connections: 1,
            db_acquire_timeout_secs: 10,
            process_batch_size: 250,
            process_max_retries: 5,
            process_concurrency: 8,
        };
        let options = ProcessOptions::from_app_config(&config);
        assert_eq!(options.batch_size, 250);
        assert_eq!(options.max_retries, 5);
        assert_eq!(options.concurrency, 8);
    }

    #[test]
    fn to_decimal_rounds_to_column_scale() {
        assert_eq!(to_decimal(0.85678, 3).to_string(), "0.857");
        assert_eq!(to_decimal(-0.5, 3), Decimal::new(-500, 3));
        assert_eq!(to_decimal(0.91234567, 4).to_string(), "0.9123");
        assert_eq!(to_decimal(f64::NAN, 3), Decimal::ZERO);
    }

    #[test]
    fn report_totals_sum_processed_only() {
        let report = ProcessingReport {
            run_public_id: Uuid::new_v4(),
            reports: vec![
                CapabilityRunReport {
                    capability: Capability::Sentiment,
                    selected: 5,
                    processed: 4,
                    failed: 1,
                    skipped: 0,
                },
                CapabilityRunReport {
                    capability: Capability::Keyword,
                    selected: 3,
                    processed: 3,
                    failed: 0,
                    skipped: 0,
                },
            ],
        };
        assert_eq!(report.total_processed(), 7);
    }
}
