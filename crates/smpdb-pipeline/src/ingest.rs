//! Batch ingestion: raw provider payloads through the adapter and the
//! de-duplication gate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use smpdb_core::Platform;
use smpdb_db::InsertOutcome;

use crate::{fail_run_best_effort, PipelineError};

/// Counts for one ingestion batch. `received` is the payload count;
/// `inserted + duplicates + failed` always equals it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub received: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// An ingestion run's outcome plus the public id of its `pipeline_runs` row.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub run_public_id: Uuid,
    pub summary: IngestSummary,
}

/// Push a batch of raw payloads through the gate.
///
/// Malformed payloads and duplicates are counted and skipped; neither
/// aborts the batch. A payload is only ever stored whole or not at all.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if the store refuses an insert; payloads
/// processed before the failure stay committed.
pub async fn ingest_batch(
    pool: &PgPool,
    platform: Platform,
    payloads: &[Value],
) -> Result<IngestSummary, PipelineError> {
    let mut summary = IngestSummary {
        received: payloads.len(),
        ..IngestSummary::default()
    };

    for payload in payloads {
        let post = match smpdb_adapters::adapt(platform, payload) {
            Ok(post) => post,
            Err(e) => {
                tracing::warn!(platform = %platform, error = %e, "rejecting malformed payload");
                summary.failed += 1;
                continue;
            }
        };

        match smpdb_db::insert_post(pool, &post).await? {
            InsertOutcome::Inserted(post_id) => {
                tracing::debug!(platform = %platform, post_id, source_id = %post.source_id, "post ingested");
                summary.inserted += 1;
            }
            InsertOutcome::Duplicate => {
                tracing::debug!(platform = %platform, source_id = %post.source_id, "duplicate discarded");
                summary.duplicates += 1;
            }
        }
    }

    tracing::info!(
        platform = %platform,
        received = summary.received,
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        failed = summary.failed,
        "ingest batch finished"
    );

    Ok(summary)
}

/// [`ingest_batch`] wrapped in `pipeline_runs` bookkeeping
/// (create → start → work → complete/fail).
///
/// # Errors
///
/// Returns [`PipelineError::Db`] when run bookkeeping or the gate fails;
/// the run row is marked failed best-effort first.
pub async fn run_ingest(
    pool: &PgPool,
    platform: Platform,
    payloads: &[Value],
    trigger_source: &str,
) -> Result<IngestReport, PipelineError> {
    let run = smpdb_db::create_pipeline_run(pool, "ingest", trigger_source).await?;
    if let Err(e) = smpdb_db::start_pipeline_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, "ingest", e.to_string()).await;
        return Err(e.into());
    }

    let summary = match ingest_batch(pool, platform, payloads).await {
        Ok(summary) => summary,
        Err(e) => {
            fail_run_best_effort(pool, run.id, "ingest", e.to_string()).await;
            return Err(e);
        }
    };

    let records = i32::try_from(summary.inserted).unwrap_or(i32::MAX);
    let detail = serde_json::to_value(summary)?;
    if let Err(e) = smpdb_db::complete_pipeline_run(pool, run.id, records, Some(detail)).await {
        fail_run_best_effort(pool, run.id, "ingest", e.to_string()).await;
        return Err(e.into());
    }

    Ok(IngestReport {
        run_public_id: run.public_id,
        summary,
    })
}
