mod analytics;
mod ingest;
mod posts;
mod processing;
mod runs;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &smpdb_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/posts", get(posts::list_posts))
        .route("/api/v1/analytics/geo", get(analytics::geo_breakdown))
        .route(
            "/api/v1/analytics/engagement",
            get(analytics::engagement_breakdown),
        )
        .route("/api/v1/analytics/summary", get(analytics::summary))
        .route(
            "/api/v1/processing/stats",
            get(processing::processing_stats),
        )
        .route("/api/v1/runs", get(runs::list_runs))
        .route("/api/v1/ingest/{platform}", post(ingest::ingest_platform))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match smpdb_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Utc;
    use serde_json::json;
    use tower::ServiceExt;

    use smpdb_core::{AuthorInfo, Capability, Engagement, NewPost, Platform};

    fn dev_app(pool: sqlx::PgPool) -> Router {
        let auth = AuthState::from_keys("", true).expect("auth");
        build_app(AppState { pool }, auth, default_rate_limit_state())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json parse")
    }

    fn seed_post(source_id: &str) -> NewPost {
        NewPost {
            platform: Platform::Twitter,
            source_id: source_id.to_string(),
            author: AuthorInfo {
                username: "citydesk".to_string(),
                display_name: None,
                follower_count: 1200,
                verified: true,
            },
            content: format!("post {source_id}"),
            media_urls: vec![],
            media_types: vec![],
            engagement: Engagement {
                likes: 7,
                shares: 1,
                replies: 0,
                views: 40,
                quotes: 0,
            },
            hashtags: vec!["transit".to_string()],
            mentions: vec![],
            is_retweet: false,
            is_quote: false,
            is_reply: false,
            posted_at: Some(Utc::now()),
            collected_at: Utc::now(),
            geo_hint: None,
            raw_payload: json!({ "id": source_id }),
        }
    }

    #[test]
    fn normalize_limit_applies_defaults_and_bounds() {
        assert_eq!(normalize_limit(None), 50);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(1_000)), 200);
        assert_eq!(normalize_limit(Some(25)), 25);
    }

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_reports_ok_with_envelope(pool: sqlx::PgPool) {
        let app = dev_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .header("x-request-id", "health-test-1")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-request-id").unwrap(),
            "health-test-1"
        );
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"].as_str(), Some("ok"));
        assert_eq!(json["meta"]["request_id"].as_str(), Some("health-test-1"));
        assert!(json["meta"]["timestamp"].is_string());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn posts_endpoint_lists_ingested_posts(pool: sqlx::PgPool) {
        smpdb_db::insert_post(&pool, &seed_post("api-post-1"))
            .await
            .expect("insert");

        let app = dev_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/posts?platform=twitter&limit=10")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["source_id"].as_str(), Some("api-post-1"));
        assert_eq!(data[0]["author_username"].as_str(), Some("citydesk"));
        assert_eq!(data[0]["likes"].as_i64(), Some(7));
        assert!(data[0].get("raw_payload").is_none(), "listing omits payloads");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn posts_endpoint_rejects_unknown_platform(pool: sqlx::PgPool) {
        let app = dev_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/posts?platform=myspace")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"].as_str(), Some("validation_error"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn ingest_endpoint_runs_the_gate_and_records_a_run(pool: sqlx::PgPool) {
        let app = dev_app(pool.clone());
        let payloads = json!([
            { "id": "901", "text": "first", "author": { "userName": "anna" } },
            { "id": "902", "text": "second", "author": { "userName": "anna" } },
            { "id": "901", "text": "first", "author": { "userName": "anna" } },
            { "note": "malformed" }
        ]);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/ingest/twitter")
                    .header("content-type", "application/json")
                    .body(Body::from(payloads.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["received"].as_u64(), Some(4));
        assert_eq!(json["data"]["inserted"].as_u64(), Some(2));
        assert_eq!(json["data"]["duplicates"].as_u64(), Some(1));
        assert_eq!(json["data"]["failed"].as_u64(), Some(1));
        assert!(json["data"]["run_id"].is_string());

        assert_eq!(smpdb_db::count_posts(&pool, None).await.unwrap(), 2);
        let runs = smpdb_db::list_pipeline_runs(&pool, 5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_type, "ingest");
        assert_eq!(runs[0].trigger_source, "api");
        assert_eq!(runs[0].status, "succeeded");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn ingest_endpoint_rejects_unknown_platform(pool: sqlx::PgPool) {
        let app = dev_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/ingest/myspace")
                    .header("content-type", "application/json")
                    .body(Body::from("[]"))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn runs_endpoint_lists_recent_runs(pool: sqlx::PgPool) {
        let payloads = vec![json!({ "id": "911", "text": "x", "author": { "userName": "a" } })];
        smpdb_pipeline::run_ingest(&pool, Platform::Twitter, &payloads, "test")
            .await
            .expect("run_ingest");

        let app = dev_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/runs?limit=5")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["run_type"].as_str(), Some("ingest"));
        assert_eq!(data[0]["status"].as_str(), Some("succeeded"));
        assert!(data[0]["run_id"].is_string());
        assert_eq!(data[0]["detail"]["inserted"].as_u64(), Some(1));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn processing_stats_surface_progress_and_failures(pool: sqlx::PgPool) {
        let post_id = match smpdb_db::insert_post(&pool, &seed_post("stats-post"))
            .await
            .expect("insert")
        {
            smpdb_db::InsertOutcome::Inserted(id) => id,
            smpdb_db::InsertOutcome::Duplicate => panic!("expected insert"),
        };
        smpdb_db::mark_failed(&pool, post_id, Capability::Sentiment, "boom", 1)
            .await
            .expect("mark_failed");

        let app = dev_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/processing/stats")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let capabilities = json["data"]["capabilities"].as_array().expect("array");
        assert_eq!(capabilities.len(), Capability::ALL.len());
        let sentiment = capabilities
            .iter()
            .find(|c| c["capability"] == "sentiment")
            .expect("sentiment row");
        assert_eq!(sentiment["total"].as_i64(), Some(1));
        assert_eq!(sentiment["failed"].as_i64(), Some(1));
        assert_eq!(sentiment["unprocessed"].as_i64(), Some(0));

        let failures = json["data"]["recent_failures"].as_array().expect("array");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0]["last_error"].as_str(), Some("boom"));
        assert_eq!(failures[0]["capability"].as_str(), Some("sentiment"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn protected_routes_require_bearer_token_when_enabled(pool: sqlx::PgPool) {
        let auth = AuthState::from_keys("secret-key", false).expect("auth");
        let app = build_app(AppState { pool }, auth, default_rate_limit_state());

        let denied = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/posts")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/posts")
                    .header("authorization", "Bearer secret-key")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(allowed.status(), StatusCode::OK);

        // Health stays public even with auth enabled.
        let health = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(health.status(), StatusCode::OK);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn analytics_summary_reflects_ingested_posts(pool: sqlx::PgPool) {
        smpdb_db::insert_post(&pool, &seed_post("sum-1"))
            .await
            .expect("insert");
        smpdb_db::insert_post(&pool, &seed_post("sum-2"))
            .await
            .expect("insert");

        let app = dev_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/analytics/summary")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["total_posts"].as_i64(), Some(2));
        let platforms = json["data"]["platforms"].as_array().expect("array");
        assert_eq!(platforms.len(), 1);
        assert_eq!(platforms[0]["platform"].as_str(), Some("twitter"));
        assert_eq!(platforms[0]["posts"].as_i64(), Some(2));
        let hashtags = json["data"]["top_hashtags"].as_array().expect("array");
        assert_eq!(hashtags[0]["hashtag"].as_str(), Some("transit"));
        let authors = json["data"]["top_authors"].as_array().expect("array");
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0]["posts"].as_i64(), Some(2));
        let processing = json["data"]["processing"].as_array().expect("array");
        assert_eq!(processing.len(), Capability::ALL.len());
        assert_eq!(processing[0]["total"].as_i64(), Some(2));
        assert_eq!(processing[0]["processed_share"].as_f64(), Some(0.0));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn engagement_rejects_unknown_group_by(pool: sqlx::PgPool) {
        let app = dev_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/analytics/engagement?group_by=minute")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"].as_str(), Some("validation_error"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn engagement_groups_by_author(pool: sqlx::PgPool) {
        smpdb_db::insert_post(&pool, &seed_post("eng-1"))
            .await
            .expect("insert");

        let app = dev_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/analytics/engagement?group_by=author")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data[0]["author_username"].as_str(), Some("citydesk"));
        assert_eq!(data[0]["likes"].as_i64(), Some(7));
    }
}
