use chrono::{DateTime, Utc};
use sqlx::PgPool;

const RECENT_RUN_LIMIT: i64 = 10;
const RECENT_FAILURE_LIMIT: i64 = 10;

/// Print per-capability progress, recent pipeline runs, and the latest
/// per-post failures.
///
/// # Errors
///
/// Returns an error if any of the status queries fail.
pub(crate) async fn run_status(pool: &PgPool) -> anyhow::Result<()> {
    let progress = smpdb_db::get_processing_progress(pool).await?;
    if progress.is_empty() {
        println!("no posts ingested yet; run `ingest` first");
    } else {
        let header = format!(
            "{:<12}{:>8}{:>11}{:>9}{:>9}",
            "CAPABILITY", "TOTAL", "PROCESSED", "PENDING", "FAILED"
        );
        println!("{header}");
        for row in &progress {
            println!(
                "{:<12}{:>8}{:>11}{:>9}{:>9}",
                row.capability, row.total, row.processed, row.pending, row.skipped
            );
        }
    }

    let runs = smpdb_db::list_pipeline_runs(pool, RECENT_RUN_LIMIT).await?;
    if !runs.is_empty() {
        println!();
        let header = format!(
            "{:<18}{:<12}{:<11}{:>8}  ERROR",
            "STARTED", "TYPE", "STATUS", "RECORDS"
        );
        println!("{header}");
        for run in &runs {
            println!(
                "{:<18}{:<12}{:<11}{:>8}  {}",
                fmt_time(run.started_at.or(Some(run.created_at))),
                run.run_type,
                run.status,
                run.records_processed,
                truncate(run.error_message.as_deref().unwrap_or("\u{2014}"), 40)
            );
        }
    }

    let failures = smpdb_db::recent_failures(pool, RECENT_FAILURE_LIMIT).await?;
    if !failures.is_empty() {
        println!();
        let header = format!(
            "{:<8}{:<10}{:<11}{:>8}  LAST ERROR",
            "POST", "PLATFORM", "CAPABILITY", "RETRIES"
        );
        println!("{header}");
        for failure in &failures {
            println!(
                "{:<8}{:<10}{:<11}{:>8}  {}",
                failure.post_id,
                failure.platform,
                failure.capability,
                failure.retry_count,
                truncate(failure.last_error.as_deref().unwrap_or("\u{2014}"), 40)
            );
        }
    }

    Ok(())
}

/// Format an optional timestamp for display, returning `"—"` when `None`.
fn fmt_time(time: Option<DateTime<Utc>>) -> String {
    time.map_or_else(
        || "\u{2014}".to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    )
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}
