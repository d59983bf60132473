//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring processing job that drains the unprocessed backlog through
//! the analyzer. Overlapping or no-op runs are harmless: the backlog query
//! is the coordination point, so a tick that finds nothing simply records
//! an empty run.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use smpdb_analyzer::AnalyzerClient;
use smpdb_geo::Gazetteer;
use smpdb_pipeline::ProcessOptions;

/// Every 15 minutes, on the minute.
const PROCESSING_SCHEDULE: &str = "0 */15 * * * *";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns an error if the gazetteer or analyzer client cannot be
/// constructed, a job cannot be registered, or the scheduler fails to
/// start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<smpdb_core::AppConfig>,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let gazetteer = Arc::new(smpdb_geo::load_gazetteer(&config.gazetteer_path)?);
    let analyzer = Arc::new(AnalyzerClient::from_app_config(&config)?);
    let options = ProcessOptions::from_app_config(&config);

    register_processing_job(&scheduler, pool, analyzer, gazetteer, options).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the recurring processing job.
///
/// Each tick drains every capability's backlog via the orchestrator and
/// records a `pipeline_runs` row for the tick.
async fn register_processing_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    analyzer: Arc<AnalyzerClient>,
    gazetteer: Arc<Gazetteer>,
    options: ProcessOptions,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async(PROCESSING_SCHEDULE, move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let analyzer = Arc::clone(&analyzer);
        let gazetteer = Arc::clone(&gazetteer);

        Box::pin(async move {
            tracing::info!("scheduler: starting processing run");
            match smpdb_pipeline::run_processing(
                &pool,
                &analyzer,
                &gazetteer,
                &options,
                "scheduler",
            )
            .await
            {
                Ok(report) => {
                    tracing::info!(
                        run = %report.run_public_id,
                        processed = report.total_processed(),
                        "scheduler: processing run complete"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "scheduler: processing run failed");
                }
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
