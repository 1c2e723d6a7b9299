//! HTTP client tests against an in-process fake backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use dubai_core::job::{JobKind, JobOutcome, JobStatus};
use dubai_polling::api::{JobStatusApi, JobStatusError, CACHE_BUSTER_PARAM};
use dubai_polling::config::{ApiConfig, PollingConfig};
use dubai_polling::controller::PollingController;
use dubai_polling::tracker::StopReason;
use serde_json::json;

#[derive(Debug, Clone)]
struct SeenRequest {
    job_id: String,
    query: HashMap<String, String>,
    headers: HeaderMap,
}

#[derive(Clone, Default)]
struct Backend {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    translation_checks: Arc<AtomicUsize>,
}

impl Backend {
    fn record(&self, job_id: &str, query: HashMap<String, String>, headers: HeaderMap) {
        self.seen.lock().unwrap().push(SeenRequest {
            job_id: job_id.to_string(),
            query,
            headers,
        });
    }

    fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

async fn video_status(
    State(backend): State<Backend>,
    Path(job_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    backend.record(&job_id, query, headers);
    match job_id.as_str() {
        "done" => Json(json!({
            "code": 0,
            "data": { "status": "completed", "video_url": "https://cdn/done.mp4" }
        }))
        .into_response(),
        "broken" => (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response(),
        "garbled" => (StatusCode::OK, "<html>oops</html>").into_response(),
        "mystery" => Json(json!({ "data": { "status": "teleporting" } })).into_response(),
        _ => Json(json!({ "data": { "status": "processing", "progress": "37%" } })).into_response(),
    }
}

async fn translation_status(
    State(backend): State<Backend>,
    Path(job_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    backend.record(&job_id, query, headers);
    let checks = backend.translation_checks.fetch_add(1, Ordering::SeqCst);
    let body = match checks {
        0 => json!({ "data": { "status": "pending" } }),
        1 => json!({ "data": { "status": "processing" } }),
        _ => json!({ "data": { "status": "success", "url": format!("https://cdn/{job_id}.srt") } }),
    };
    Json(body).into_response()
}

/// Serve the fake backend on an ephemeral port and return its base URL.
async fn spawn_backend(backend: Backend) -> String {
    let app = Router::new()
        .route("/v1/video/status/{job_id}", get(video_status))
        .route("/v1/translation/status/{job_id}", get(translation_status))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1/")
}

fn client(base_url: String) -> JobStatusApi {
    JobStatusApi::new(ApiConfig::new(base_url).with_auth_token("secret-token")).unwrap()
}

#[tokio::test]
async fn fetch_parses_terminal_success() {
    let backend = Backend::default();
    let api = client(spawn_backend(backend.clone()).await);

    let snapshot = api
        .fetch_status("done", JobKind::VideoGeneration)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(snapshot.status, JobStatus::Succeeded);
    assert_eq!(snapshot.result_url.as_deref(), Some("https://cdn/done.mp4"));
    assert_eq!(backend.seen()[0].job_id, "done");
}

#[tokio::test]
async fn fetch_parses_percent_string_progress() {
    let api = client(spawn_backend(Backend::default()).await);

    let snapshot = api
        .fetch_status("abc123", JobKind::VideoGeneration)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(snapshot.status, JobStatus::Processing);
    assert_eq!(snapshot.progress, Some(37.0));
}

#[tokio::test]
async fn requests_carry_auth_and_bypass_caches() {
    let backend = Backend::default();
    let api = client(spawn_backend(backend.clone()).await);

    for _ in 0..3 {
        api.fetch_status("abc123", JobKind::VideoGeneration)
            .await
            .unwrap();
    }

    let seen = backend.seen();
    assert_eq!(seen.len(), 3);
    for request in &seen {
        let header = |name: &str| {
            request
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        assert_eq!(header("authorization").as_deref(), Some("Bearer secret-token"));
        assert_eq!(
            header("cache-control").as_deref(),
            Some("no-cache, no-store, must-revalidate")
        );
        assert_eq!(header("pragma").as_deref(), Some("no-cache"));
        assert_eq!(header("expires").as_deref(), Some("0"));
    }

    let busters: Vec<i64> = seen
        .iter()
        .map(|r| r.query[CACHE_BUSTER_PARAM].parse().unwrap())
        .collect();
    assert!(busters.windows(2).all(|w| w[0] < w[1]), "{busters:?}");
}

#[tokio::test]
async fn missing_token_sends_no_authorization() {
    let backend = Backend::default();
    let base = spawn_backend(backend.clone()).await;
    let api = JobStatusApi::new(ApiConfig::new(base)).unwrap();

    api.fetch_status("abc123", JobKind::VideoGeneration)
        .await
        .unwrap();

    assert!(backend.seen()[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn non_success_status_is_api_error() {
    let api = client(spawn_backend(Backend::default()).await);

    let err = api
        .fetch_status("broken", JobKind::VideoGeneration)
        .await
        .unwrap_err();

    assert_matches!(err, JobStatusError::ApiError { status: 503, body } if body == "maintenance");
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let api = client(spawn_backend(Backend::default()).await);

    let err = api
        .fetch_status("garbled", JobKind::VideoGeneration)
        .await
        .unwrap_err();

    assert_matches!(err, JobStatusError::Decode(_));
}

#[tokio::test]
async fn unknown_status_is_no_status() {
    let api = client(spawn_backend(Backend::default()).await);

    let snapshot = api
        .fetch_status("mystery", JobKind::VideoGeneration)
        .await
        .unwrap();

    assert_eq!(snapshot, None);
}

#[tokio::test]
async fn unroutable_job_id_is_rejected_without_request() {
    let backend = Backend::default();
    let api = client(spawn_backend(backend.clone()).await);

    for bad in ["", "a/b", "a b", "a?b"] {
        let err = api
            .fetch_status(bad, JobKind::VideoGeneration)
            .await
            .unwrap_err();
        assert_matches!(err, JobStatusError::InvalidJobId(_));
    }
    assert!(backend.seen().is_empty());
}

#[tokio::test]
async fn unreachable_backend_is_request_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = client(format!("http://{addr}"));
    let err = api
        .fetch_status("abc123", JobKind::VideoGeneration)
        .await
        .unwrap_err();

    assert_matches!(err, JobStatusError::Request(_));
}

#[tokio::test]
async fn controller_tracks_translation_over_http() {
    let backend = Backend::default();
    let api = Arc::new(client(spawn_backend(backend.clone()).await));
    let config = PollingConfig {
        interval: Duration::from_millis(20),
        ..PollingConfig::default()
    };
    let (tx, rx) = tokio::sync::oneshot::channel();

    let handle = PollingController::new(api, config)
        .start("tr-9", JobKind::Translation, move |outcome| {
            let _ = tx.send(outcome);
        })
        .unwrap();

    let exit = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("polling should finish");

    assert_eq!(exit.reason, StopReason::Succeeded);
    assert_eq!(
        rx.await.unwrap(),
        JobOutcome::Succeeded {
            url: "https://cdn/tr-9.srt".into()
        }
    );
    assert_eq!(backend.translation_checks.load(Ordering::SeqCst), 3);
}
