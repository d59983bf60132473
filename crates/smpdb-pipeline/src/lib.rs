//! Batch ingestion and per-capability processing orchestration.
//!
//! Two run shapes share this crate: [`run_ingest`] pushes raw payloads
//! through the adapter and the de-duplication gate, and [`run_processing`]
//! drains unprocessed posts through the analyzer one capability at a time.
//! Both record a `pipeline_runs` row around the work; per-record failures
//! are counted, only store-level failures abort a run.

use thiserror::Error;

use smpdb_db::DbError;

mod ingest;
mod orchestrator;

pub use ingest::{ingest_batch, run_ingest, IngestReport, IngestSummary};
pub use orchestrator::{
    process_capability, run_processing, CapabilityRunReport, ProcessOptions, ProcessingReport,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The store refused a query or commit. The in-flight run aborts; the
    /// next run resumes from the unprocessed backlog with nothing lost.
    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("failed to encode run detail: {0}")]
    Detail(#[from] serde_json::Error),
}

/// Mark a run failed, logging instead of propagating when even that write
/// fails. Used on abort paths where the original error matters more.
pub(crate) async fn fail_run_best_effort(
    pool: &sqlx::PgPool,
    run_id: i64,
    context: &'static str,
    message: String,
) {
    if let Err(mark_err) = smpdb_db::fail_pipeline_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark {context} run as failed"
        );
    }
}
