use std::str::FromStr;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use smpdb_core::Platform;
use smpdb_pipeline::PipelineError;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct IngestData {
    run_id: Uuid,
    received: usize,
    inserted: usize,
    duplicates: usize,
    failed: usize,
}

/// Push a JSON array of raw provider payloads through the ingestion gate.
///
/// Malformed payloads and duplicates are counted, never errors; the
/// response carries the batch summary and the recorded run's id.
pub(super) async fn ingest_platform(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(platform): Path<String>,
    Json(payloads): Json<Vec<Value>>,
) -> Result<Json<ApiResponse<IngestData>>, ApiError> {
    let platform = Platform::from_str(&platform)
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;

    let report = smpdb_pipeline::run_ingest(&state.pool, platform, &payloads, "api")
        .await
        .map_err(|e| match e {
            PipelineError::Db(db) => super::map_db_error(req_id.0.clone(), &db),
            PipelineError::Detail(_) => {
                tracing::error!(error = %e, "failed to record ingest run detail");
                ApiError::new(req_id.0.clone(), "internal_error", "failed to record run")
            }
        })?;

    Ok(Json(ApiResponse {
        data: IngestData {
            run_id: report.run_public_id,
            received: report.summary.received,
            inserted: report.summary.inserted,
            duplicates: report.summary.duplicates,
            failed: report.summary.failed,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
