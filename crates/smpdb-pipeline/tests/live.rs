//! End-to-end pipeline tests: real Postgres via `#[sqlx::test]`, mocked
//! analyzer via wiremock.
//!
//! Each test gets a fresh, fully-migrated database; the `migrations` path
//! is relative to the crate root (`crates/smpdb-pipeline/`).

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use smpdb_analyzer::AnalyzerClient;
use smpdb_core::{AuthorInfo, Capability, Engagement, NewPost, Platform};
use smpdb_db::{InsertOutcome, PostFilters};
use smpdb_geo::{Gazetteer, GazetteerEntry, GazetteerFile, ResolutionMethod};
use smpdb_pipeline::{
    ingest_batch, process_capability, run_ingest, run_processing, ProcessOptions,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_post(platform: Platform, source_id: &str, collected_at: DateTime<Utc>) -> NewPost {
    NewPost {
        platform,
        source_id: source_id.to_string(),
        author: AuthorInfo {
            username: "citydesk".to_string(),
            display_name: None,
            follower_count: 500,
            verified: false,
        },
        content: format!("update {source_id} from downtown"),
        media_urls: vec![],
        media_types: vec![],
        engagement: Engagement::default(),
        hashtags: vec!["traffic".to_string()],
        mentions: vec![],
        is_retweet: false,
        is_quote: false,
        is_reply: false,
        posted_at: Some(collected_at),
        collected_at,
        geo_hint: Some("Portland, OR".to_string()),
        raw_payload: json!({ "id": source_id }),
    }
}

async fn insert_expecting_id(pool: &sqlx::PgPool, post: &NewPost) -> i64 {
    match smpdb_db::insert_post(pool, post)
        .await
        .expect("insert_post failed")
    {
        InsertOutcome::Inserted(id) => id,
        InsertOutcome::Duplicate => panic!("expected insert, got duplicate"),
    }
}

fn test_client(base_url: &str) -> AnalyzerClient {
    AnalyzerClient::with_base_url(base_url, None, 30)
        .expect("client construction should not fail")
        .with_retry_policy(0, 0)
}

fn test_gazetteer() -> Gazetteer {
    Gazetteer::from_file(GazetteerFile {
        default_region: Some("unknown".to_string()),
        abbreviations: HashMap::from([("pdx".to_string(), "Portland".to_string())]),
        places: vec![GazetteerEntry {
            name: "Portland".to_string(),
            region: "Portland".to_string(),
            country: "US".to_string(),
            latitude: Some(45.5152),
            longitude: Some(-122.6784),
            aliases: vec!["Stumptown".to_string()],
        }],
    })
    .expect("test gazetteer should validate")
}

fn sentiment_body() -> serde_json::Value {
    json!({
        "status": "ok",
        "label": "neutral",
        "score": 0.1,
        "confidence": 0.88,
        "model": "sentiment-v2"
    })
}

async fn mount_healthy_sentiment(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/sentiment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sentiment_body()))
        .mount(server)
        .await;
}

fn tweet_payload(id: &str, text: &str) -> serde_json::Value {
    json!({
        "id": id,
        "text": text,
        "author": { "userName": "pdx_anna", "followers": 321 },
        "likeCount": 4
    })
}

// ---------------------------------------------------------------------------
// Ingestion runs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_batch_counts_inserted_duplicate_and_malformed(pool: sqlx::PgPool) {
    let payloads = vec![
        tweet_payload("101", "coffee lines in Portland this morning"),
        tweet_payload("102", "bridge traffic is wild"),
        tweet_payload("101", "coffee lines in Portland this morning"),
        json!({ "note": "no id, no author" }),
    ];

    let summary = ingest_batch(&pool, Platform::Twitter, &payloads)
        .await
        .expect("ingest_batch failed");

    assert_eq!(summary.received, 4);
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.failed, 1);

    assert_eq!(smpdb_db::count_posts(&pool, None).await.unwrap(), 2);

    let posts = smpdb_db::list_posts(
        &pool,
        PostFilters {
            limit: 10,
            ..PostFilters::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|p| p.platform == "twitter"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_ingest_records_a_succeeded_run(pool: sqlx::PgPool) {
    let payloads = vec![
        tweet_payload("201", "morning update"),
        tweet_payload("202", "evening update"),
        tweet_payload("201", "morning update"),
    ];

    let report = run_ingest(&pool, Platform::Twitter, &payloads, "test")
        .await
        .expect("run_ingest failed");

    assert_eq!(report.summary.inserted, 2);
    assert_eq!(report.summary.duplicates, 1);

    let runs = smpdb_db::list_pipeline_runs(&pool, 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.public_id, report.run_public_id);
    assert_eq!(run.run_type, "ingest");
    assert_eq!(run.trigger_source, "test");
    assert_eq!(run.status, "succeeded");
    assert_eq!(run.records_processed, 2);

    let detail = run.detail.as_ref().expect("run should carry a detail blob");
    assert_eq!(detail["received"], 3);
    assert_eq!(detail["inserted"], 2);
    assert_eq!(detail["duplicates"], 1);
}

// ---------------------------------------------------------------------------
// Processing: sentiment drain
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn drain_sentiment_processes_backlog_and_is_idempotent(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    mount_healthy_sentiment(&server).await;

    let base = Utc::now() - Duration::hours(1);
    let first = insert_expecting_id(&pool, &make_post(Platform::Twitter, "s-1", base)).await;
    let second =
        insert_expecting_id(&pool, &make_post(Platform::Tiktok, "s-2", base + Duration::minutes(5)))
            .await;

    let client = test_client(&server.uri());
    let gazetteer = test_gazetteer();
    let options = ProcessOptions::default();

    let report = process_capability(&pool, &client, &gazetteer, Capability::Sentiment, &options)
        .await
        .expect("drain failed");
    assert_eq!(report.capability, Capability::Sentiment);
    assert_eq!(report.selected, 2);
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped, 0);

    for post_id in [first, second] {
        let rows = smpdb_db::list_sentiment_for_post(&pool, post_id).await.unwrap();
        assert_eq!(rows.len(), 1, "post {post_id} should have one sentiment row");
        assert_eq!(rows[0].label, "neutral");
        assert_eq!(rows[0].model, "sentiment-v2");
    }

    // Second drain selects nothing and writes nothing.
    let again = process_capability(&pool, &client, &gazetteer, Capability::Sentiment, &options)
        .await
        .expect("re-drain failed");
    assert_eq!(again.selected, 0);
    assert_eq!(again.processed, 0);
    assert_eq!(
        smpdb_db::list_sentiment_for_post(&pool, first).await.unwrap().len(),
        1
    );

    let progress = smpdb_db::get_processing_progress(&pool).await.unwrap();
    let sentiment = progress
        .iter()
        .find(|row| row.capability == "sentiment")
        .expect("sentiment progress row");
    assert_eq!(sentiment.total, 2);
    assert_eq!(sentiment.processed, 2);
    assert_eq!(sentiment.pending, 0);
    assert_eq!(sentiment.skipped, 0);

    // Other capabilities are untouched by a sentiment drain.
    let location = progress
        .iter()
        .find(|row| row.capability == "location")
        .expect("location progress row");
    assert_eq!(location.pending, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn one_failing_post_does_not_block_the_batch(pool: sqlx::PgPool) {
    let server = MockServer::start().await;

    let base = Utc::now() - Duration::hours(1);
    let healthy =
        insert_expecting_id(&pool, &make_post(Platform::Twitter, "ok-1", base)).await;
    let flaky = insert_expecting_id(
        &pool,
        &make_post(Platform::Twitter, "flaky-1", base + Duration::minutes(5)),
    )
    .await;

    // The flaky post's text is rejected once, then the catch-all serves it.
    Mock::given(method("POST"))
        .and(path("/v1/sentiment"))
        .and(body_json(json!({ "text": "update flaky-1 from downtown" })))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "status": "error",
            "message": "text rejected"
        })))
        .with_priority(1)
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/sentiment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sentiment_body()))
        .with_priority(10)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let gazetteer = test_gazetteer();
    let options = ProcessOptions::default();

    let report = process_capability(&pool, &client, &gazetteer, Capability::Sentiment, &options)
        .await
        .expect("drain failed");

    // Pull 1 selects both, the flaky one fails; pull 2 re-selects it and
    // succeeds; pull 3 comes back empty.
    assert_eq!(report.selected, 3);
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 0);

    for post_id in [healthy, flaky] {
        assert_eq!(
            smpdb_db::list_sentiment_for_post(&pool, post_id).await.unwrap().len(),
            1
        );
    }

    // The successful flip clears the error recorded by the failed attempt.
    let statuses = smpdb_db::get_status_for_post(&pool, flaky).await.unwrap();
    let sentiment = statuses
        .iter()
        .find(|s| s.capability == "sentiment")
        .unwrap();
    assert!(sentiment.processed);
    assert_eq!(sentiment.retry_count, 1);
    assert!(sentiment.last_error.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn poison_post_is_skipped_after_retry_budget(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sentiment"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "status": "error",
            "message": "unsupported input"
        })))
        .mount(&server)
        .await;

    let post_id =
        insert_expecting_id(&pool, &make_post(Platform::Twitter, "poison-1", Utc::now())).await;

    let client = test_client(&server.uri());
    let gazetteer = test_gazetteer();
    let options = ProcessOptions {
        max_retries: 2,
        ..ProcessOptions::default()
    };

    let report = process_capability(&pool, &client, &gazetteer, Capability::Sentiment, &options)
        .await
        .expect("drain failed");

    // Attempt 1 fails and stays eligible; attempt 2 exhausts the budget.
    assert_eq!(report.selected, 2);
    assert_eq!(report.processed, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 1);

    // Terminal skip: flipped with the error retained, no result rows.
    let statuses = smpdb_db::get_status_for_post(&pool, post_id).await.unwrap();
    let sentiment = statuses
        .iter()
        .find(|s| s.capability == "sentiment")
        .unwrap();
    assert!(sentiment.processed);
    assert_eq!(sentiment.retry_count, 2);
    let error = sentiment.last_error.as_deref().unwrap_or_default();
    assert!(error.contains("422"), "unexpected last_error: {error}");
    assert!(
        smpdb_db::list_sentiment_for_post(&pool, post_id).await.unwrap().is_empty()
    );

    // Excluded from future selection, visible as skipped in progress.
    let batch = smpdb_db::get_unprocessed(&pool, Capability::Sentiment, 10, options.max_retries)
        .await
        .unwrap();
    assert!(batch.is_empty());

    let progress = smpdb_db::get_processing_progress(&pool).await.unwrap();
    let row = progress
        .iter()
        .find(|row| row.capability == "sentiment")
        .unwrap();
    assert_eq!(row.skipped, 1);
    assert_eq!(row.processed, 0);
    assert_eq!(row.pending, 0);
}

// ---------------------------------------------------------------------------
// Processing: locations and the gazetteer
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn location_results_carry_region_and_resolution(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "model": "ner-geo-v1",
            "locations": [
                { "text": "Stumptown", "type": "city", "confidence": 0.95 },
                { "text": "the waterfront", "type": "poi", "confidence": 0.61 }
            ]
        })))
        .mount(&server)
        .await;

    let post_id =
        insert_expecting_id(&pool, &make_post(Platform::Twitter, "loc-1", Utc::now())).await;

    let client = test_client(&server.uri());
    let gazetteer = test_gazetteer();
    let options = ProcessOptions::default();

    let report = process_capability(&pool, &client, &gazetteer, Capability::Location, &options)
        .await
        .expect("drain failed");
    assert_eq!(report.processed, 1);

    let rows = smpdb_db::list_locations_for_post(&pool, post_id).await.unwrap();
    assert_eq!(rows.len(), 2);

    // Alias hit on the mention itself.
    let alias_hit = rows.iter().find(|r| r.location_text == "Stumptown").unwrap();
    assert_eq!(alias_hit.region.as_deref(), Some("Portland"));
    assert_eq!(alias_hit.country.as_deref(), Some("US"));
    assert_eq!(alias_hit.resolution, ResolutionMethod::Exact.as_str());
    assert!(alias_hit.latitude.is_some());

    // The mention misses; the post's geo hint resolves through the comma
    // segment ("Portland, OR" -> "Portland").
    let hint_hit = rows
        .iter()
        .find(|r| r.location_text == "the waterfront")
        .unwrap();
    assert_eq!(hint_hit.region.as_deref(), Some("Portland"));
    assert_eq!(hint_hit.resolution, ResolutionMethod::Fuzzy.as_str());
}

#[sqlx::test(migrations = "../../migrations")]
async fn zero_location_analysis_still_flips_status(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "model": "ner-geo-v1",
            "locations": []
        })))
        .mount(&server)
        .await;

    let post_id =
        insert_expecting_id(&pool, &make_post(Platform::Twitter, "loc-empty", Utc::now())).await;

    let client = test_client(&server.uri());
    let gazetteer = test_gazetteer();

    let report = process_capability(
        &pool,
        &client,
        &gazetteer,
        Capability::Location,
        &ProcessOptions::default(),
    )
    .await
    .expect("drain failed");
    assert_eq!(report.processed, 1);

    assert!(
        smpdb_db::list_locations_for_post(&pool, post_id).await.unwrap().is_empty()
    );
    let statuses = smpdb_db::get_status_for_post(&pool, post_id).await.unwrap();
    let location = statuses
        .iter()
        .find(|s| s.capability == "location")
        .unwrap();
    assert!(location.processed);
    assert!(location.last_error.is_none());
}

// ---------------------------------------------------------------------------
// Full processing runs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn run_processing_records_run_with_per_capability_detail(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    mount_healthy_sentiment(&server).await;

    let base = Utc::now() - Duration::minutes(30);
    insert_expecting_id(&pool, &make_post(Platform::Twitter, "r-1", base)).await;
    insert_expecting_id(&pool, &make_post(Platform::Facebook, "r-2", base)).await;

    let client = test_client(&server.uri());
    let gazetteer = test_gazetteer();
    let options = ProcessOptions {
        capability: Some(Capability::Sentiment),
        ..ProcessOptions::default()
    };

    let report = run_processing(&pool, &client, &gazetteer, &options, "scheduler")
        .await
        .expect("run_processing failed");
    assert_eq!(report.reports.len(), 1);
    assert_eq!(report.total_processed(), 2);

    let runs = smpdb_db::list_pipeline_runs(&pool, 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.public_id, report.run_public_id);
    assert_eq!(run.run_type, "processing");
    assert_eq!(run.trigger_source, "scheduler");
    assert_eq!(run.status, "succeeded");
    assert_eq!(run.records_processed, 2);

    let detail = run.detail.as_ref().expect("run should carry a detail blob");
    let entries = detail.as_array().expect("detail should be a report array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["capability"], "sentiment");
    assert_eq!(entries[0]["processed"], 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_processing_drains_all_capabilities_in_order(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    mount_healthy_sentiment(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok", "model": "ner-geo-v1", "locations": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/entities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "model": "ner-v3",
            "entities": [{ "text": "TriMet", "type": "org", "confidence": 0.83 }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/keywords"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "model": "keywords-v1",
            "keywords": [{ "keyword": "downtown", "score": 0.7 }]
        })))
        .mount(&server)
        .await;

    let post_id =
        insert_expecting_id(&pool, &make_post(Platform::Twitter, "all-1", Utc::now())).await;

    let client = test_client(&server.uri());
    let gazetteer = test_gazetteer();

    let report = run_processing(
        &pool,
        &client,
        &gazetteer,
        &ProcessOptions::default(),
        "manual",
    )
    .await
    .expect("run_processing failed");

    let drained: Vec<Capability> = report.reports.iter().map(|r| r.capability).collect();
    assert_eq!(drained, Capability::ALL.to_vec());
    assert_eq!(report.total_processed(), 4);

    assert_eq!(
        smpdb_db::list_entities_for_post(&pool, post_id).await.unwrap().len(),
        1
    );
    assert_eq!(
        smpdb_db::list_keywords_for_post(&pool, post_id).await.unwrap().len(),
        1
    );

    let progress = smpdb_db::get_processing_progress(&pool).await.unwrap();
    assert!(progress.iter().all(|row| row.pending == 0));
}
