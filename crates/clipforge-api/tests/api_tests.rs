//! HTTP route tests against an in-process router.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use clipforge_api::{create_router, ApiConfig, AppState};
use clipforge_models::{TimeRange, Transcript};
use clipforge_worker::{
    ClipDetector, Dispatcher, InMemoryJobStore, StageAdapters, Transcriber, Trimmer, WorkerConfig,
};

struct StaticTranscriber;

#[async_trait]
impl Transcriber for StaticTranscriber {
    async fn transcribe(&self, _media: &Path) -> anyhow::Result<Transcript> {
        Ok(Transcript::default())
    }
}

struct StaticDetector(Vec<TimeRange>);

#[async_trait]
impl ClipDetector for StaticDetector {
    async fn detect_clips(&self, _transcript: &Transcript) -> anyhow::Result<Vec<TimeRange>> {
        Ok(self.0.clone())
    }
}

struct FileTrimmer;

#[async_trait]
impl Trimmer for FileTrimmer {
    async fn trim(&self, _media: &Path, _range: TimeRange, output: &Path) -> anyhow::Result<()> {
        tokio::fs::write(output, b"clip").await?;
        Ok(())
    }
}

struct TestApp {
    dir: TempDir,
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let worker_config = WorkerConfig {
            cache_dir: dir.path().join("cache"),
            output_dir: dir.path().join("clips"),
            ..Default::default()
        };
        let adapters = StageAdapters::new(
            Arc::new(StaticTranscriber),
            Arc::new(StaticDetector(vec![
                TimeRange::new(0.0, 4.0).unwrap(),
                TimeRange::new(6.0, 9.5).unwrap(),
            ])),
            Arc::new(FileTrimmer),
        );
        let dispatcher = Dispatcher::from_config(
            &worker_config,
            Arc::new(InMemoryJobStore::new()),
            adapters,
        )
        .await
        .unwrap();

        let state = AppState::new(ApiConfig::default(), Arc::new(dispatcher));
        Self {
            dir,
            router: create_router(state, None),
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn media(&self) -> String {
        let path = self.dir.path().join("talk.mp4");
        tokio::fs::write(&path, b"video").await.unwrap();
        path.to_string_lossy().to_string()
    }

    async fn wait_terminal(&self, job_id: &str) -> Value {
        for _ in 0..250 {
            let (status, body) = self
                .send(Method::GET, &format!("/api/clips/status/{job_id}"), None)
                .await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] == "completed" || body["status"] == "failed" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {job_id} did not finish");
    }
}

#[tokio::test]
async fn generate_then_poll_until_completed() {
    let app = TestApp::new().await;
    let media = app.media().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/clips/generate",
            Some(json!({ "video_path": media })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "pending");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let job = app.wait_terminal(&job_id).await;
    assert_eq!(job["job_id"], job_id.as_str());
    assert_eq!(job["status"], "completed");
    assert_eq!(job["status_message"], "completed: 2 clips generated");
    assert!(job["error_message"].is_null());
    assert!(job["completed_at"].is_string());

    let clips = job["generated_clips"].as_array().unwrap();
    assert_eq!(clips.len(), 2);
    assert_eq!(clips[1]["start_time"], 6.0);
    assert_eq!(clips[1]["end_time"], 9.5);
    assert_eq!(clips[1]["duration"], 3.5);
    assert_eq!(
        clips[0]["filename"],
        format!("clip_{}_001.mp4", job_id).as_str()
    );
}

#[tokio::test]
async fn failed_job_renders_error_and_null_clips() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/clips/generate",
            Some(json!({ "video_path": "/no/such/file.mp4" })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let job = app.wait_terminal(body["job_id"].as_str().unwrap()).await;
    assert_eq!(job["status"], "failed");
    assert!(job["generated_clips"].is_null());
    assert!(job["error_message"]
        .as_str()
        .unwrap()
        .starts_with("input: "));
}

#[tokio::test]
async fn empty_video_path_is_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/clips/generate",
            Some(json!({ "video_path": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, _) = app
        .send(
            Method::POST,
            "/api/clips/generate",
            Some(json!({ "video_path": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(Method::GET, "/api/clips/status/does-not-exist", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("does-not-exist"));

    let (status, _) = app
        .send(Method::DELETE, "/api/clips/does-not-exist", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_job() {
    let app = TestApp::new().await;
    let media = app.media().await;

    let (_, body) = app
        .send(
            Method::POST,
            "/api/clips/generate",
            Some(json!({ "video_path": media })),
        )
        .await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    let job = app.wait_terminal(&job_id).await;
    let clip_path = job["generated_clips"][0]["path"].as_str().unwrap().to_string();
    assert!(Path::new(&clip_path).exists());

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/clips/{job_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());
    assert!(!Path::new(&clip_path).exists());

    let (status, _) = app
        .send(Method::GET, &format!("/api/clips/status/{job_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_endpoints() {
    let app = TestApp::new().await;

    for uri in ["/health", "/api/clips/health"] {
        let (status, body) = app.send(Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "clipforge");
    }
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = TestApp::new().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Request-ID", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());
}
