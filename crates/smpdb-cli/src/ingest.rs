use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use smpdb_core::Platform;
use sqlx::PgPool;

/// Read a JSON array of raw provider payloads from disk and push it
/// through the ingestion gate, recording a pipeline run.
///
/// Malformed and duplicate payloads are counted, not fatal; the printed
/// summary shows how the batch split.
///
/// # Errors
///
/// Returns an error if the platform is unknown, the file cannot be read
/// or is not a JSON array, or the run fails at the store.
pub(crate) async fn run_ingest_file(
    pool: &PgPool,
    platform: &str,
    file: &Path,
) -> anyhow::Result<()> {
    let platform: Platform = platform.parse()?;
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let payloads: Vec<Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of provider records", file.display()))?;

    if payloads.is_empty() {
        println!("{} holds no records; nothing to ingest", file.display());
        return Ok(());
    }

    let report = smpdb_pipeline::run_ingest(pool, platform, &payloads, "cli").await?;
    let summary = &report.summary;
    println!(
        "ingest run {}: received {}, inserted {}, duplicates {}, malformed {}",
        report.run_public_id,
        summary.received,
        summary.inserted,
        summary.duplicates,
        summary.failed
    );

    Ok(())
}
