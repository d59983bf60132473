use smpdb_analyzer::AnalyzerClient;
use smpdb_core::{AppConfig, Capability};
use smpdb_pipeline::ProcessOptions;
use sqlx::PgPool;

/// Drain the processing backlog for one capability, or all of them in
/// declaration order, and print the per-capability reports.
///
/// # Errors
///
/// Returns an error if the capability is unknown, the gazetteer or
/// analyzer client cannot be built, or the run fails at the store.
pub(crate) async fn run_process(
    pool: &PgPool,
    config: &AppConfig,
    capability: Option<&str>,
    batch_size: Option<i64>,
) -> anyhow::Result<()> {
    let mut options = ProcessOptions::from_app_config(config);
    if let Some(raw) = capability {
        options.capability = Some(raw.parse::<Capability>()?);
    }
    if let Some(size) = batch_size {
        anyhow::ensure!(size > 0, "--batch-size must be positive, got {size}");
        options.batch_size = size;
    }
    tracing::debug!(
        batch_size = options.batch_size,
        max_retries = options.max_retries,
        concurrency = options.concurrency,
        "process options resolved"
    );

    let gazetteer = smpdb_geo::load_gazetteer(&config.gazetteer_path)?;
    let analyzer = AnalyzerClient::from_app_config(config)?;

    let report =
        smpdb_pipeline::run_processing(pool, &analyzer, &gazetteer, &options, "cli").await?;

    println!("processing run {}", report.run_public_id);
    for cap in &report.reports {
        println!(
            "  {:<10} selected {}, processed {}, failed {}, skipped {}",
            cap.capability.as_str(),
            cap.selected,
            cap.processed,
            cap.failed,
            cap.skipped
        );
    }
    let total_selected: usize = report.reports.iter().map(|r| r.selected).sum();
    if total_selected == 0 {
        println!("no unprocessed posts found; run `ingest` first");
    } else {
        println!("total processed: {}", report.total_processed());
    }

    Ok(())
}
