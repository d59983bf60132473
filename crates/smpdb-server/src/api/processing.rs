use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

/// Per-capability progress. `failed` counts posts given up on after the
/// retry budget; mid-retry posts stay in `unprocessed` until they succeed
/// or exhaust it.
#[derive(Debug, Serialize)]
pub(super) struct CapabilityProgressItem {
    capability: String,
    total: i64,
    processed: i64,
    unprocessed: i64,
    failed: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct PlatformProgressItem {
    platform: String,
    capability: String,
    total: i64,
    processed: i64,
    unprocessed: i64,
    failed: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct RecentFailureItem {
    post_id: i64,
    platform: String,
    capability: String,
    retry_count: i32,
    gave_up: bool,
    last_error: Option<String>,
    last_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProcessingStatsData {
    capabilities: Vec<CapabilityProgressItem>,
    by_platform: Vec<PlatformProgressItem>,
    recent_failures: Vec<RecentFailureItem>,
}

const RECENT_FAILURE_LIMIT: i64 = 10;

pub(super) async fn processing_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<ProcessingStatsData>>, ApiError> {
    let progress = smpdb_db::get_processing_progress(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let by_platform = smpdb_db::processing_stats(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let failures = smpdb_db::recent_failures(&state.pool, RECENT_FAILURE_LIMIT)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = ProcessingStatsData {
        capabilities: progress
            .into_iter()
            .map(|row| CapabilityProgressItem {
                capability: row.capability,
                total: row.total,
                processed: row.processed,
                unprocessed: row.pending,
                failed: row.skipped,
            })
            .collect(),
        by_platform: by_platform
            .into_iter()
            .map(|row| PlatformProgressItem {
                platform: row.platform,
                capability: row.capability,
                total: row.total,
                processed: row.processed,
                unprocessed: row.pending,
                failed: row.skipped,
            })
            .collect(),
        recent_failures: failures
            .into_iter()
            .map(|row| RecentFailureItem {
                post_id: row.post_id,
                platform: row.platform,
                capability: row.capability,
                retry_count: row.retry_count,
                gave_up: row.processed,
                last_error: row.last_error,
                last_attempt_at: row.last_attempt_at,
            })
            .collect(),
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
