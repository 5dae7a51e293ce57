use crate::{
    error::AppError,
    models::{DownloadRequest, DownloadResponse, ServiceStatus},
    AppState,
};
use async_trait::async_trait;
use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

pub const STATUS_MESSAGE: &str = "YouTube Downloader API is running";

/// Exit status and captured streams of a finished job.
#[derive(Debug, Clone, Default)]
pub struct JobOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Executes one download job out of process.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, args: &[String]) -> std::io::Result<JobOutput>;
}

/// Runs `<program> download <args>` in the service's working directory.
pub struct ProcessRunner {
    program: PathBuf,
    work_dir: PathBuf,
}

impl ProcessRunner {
    pub fn new(program: PathBuf, work_dir: PathBuf) -> Self {
        Self { program, work_dir }
    }
}

#[async_trait]
impl JobRunner for ProcessRunner {
    async fn run(&self, args: &[String]) -> std::io::Result<JobOutput> {
        let output = Command::new(&self.program)
            .arg("download")
            .args(args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(JobOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Download CLI arguments equivalent to the request.
pub fn job_args(url: &str, req: &DownloadRequest) -> Vec<String> {
    let mut args = vec![url.to_string()];
    if req.audio_only {
        args.extend(["-a".to_string(), "--audio-format".to_string(), req.audio_format.clone()]);
    } else {
        args.extend([
            "-r".to_string(),
            req.resolution.clone(),
            "-f".to_string(),
            req.format.clone(),
        ]);
    }
    args
}

// ===================================================================
//                          DOWNLOAD HANDLER
// ===================================================================

/// # POST /api/download - Runs a download job and waits for it to finish.
pub async fn start_download(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // Parsed by hand so that malformed bodies surface as 500s, not extractor rejections.
    let payload: DownloadRequest = serde_json::from_slice(&body)?;
    let Some(url) = payload.url() else {
        return Err(AppError::BadRequest("URL is required".to_string()));
    };
    let args = job_args(url, &payload);

    // Waits for a free slot instead of spawning without bound.
    let _permit = state.jobs.acquire().await?;
    tracing::info!("Running download job: {}", args.join(" "));
    let output = state.runner.run(&args).await?;

    if output.success {
        tracing::info!("Download job finished for {}", url);
        Ok((
            StatusCode::OK,
            Json(DownloadResponse {
                success: true,
                message: "Download completed successfully!".to_string(),
                output: output.stdout,
            }),
        ))
    } else {
        tracing::error!("Download failed for {}: {}", url, output.stderr.trim());
        Err(AppError::DownloadFailed(output.stderr))
    }
}

// ===================================================================
//                          STATUS HANDLER
// ===================================================================

/// # GET /api/status - Liveness probe.
pub async fn status() -> impl IntoResponse {
    (StatusCode::OK, Json(ServiceStatus { status: STATUS_MESSAGE }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request},
        Router,
    };
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::{mpsc, Notify, Semaphore};
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<Vec<String>>>,
        output: JobOutput,
    }

    #[async_trait]
    impl JobRunner for RecordingRunner {
        async fn run(&self, args: &[String]) -> std::io::Result<JobOutput> {
            self.calls.lock().unwrap().push(args.to_vec());
            Ok(self.output.clone())
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl JobRunner for FailingRunner {
        async fn run(&self, _args: &[String]) -> std::io::Result<JobOutput> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such program"))
        }
    }

    /// Reports each call as it starts, then holds it until released.
    struct GatedRunner {
        started: mpsc::UnboundedSender<String>,
        release: Notify,
    }

    #[async_trait]
    impl JobRunner for GatedRunner {
        async fn run(&self, args: &[String]) -> std::io::Result<JobOutput> {
            let _ = self.started.send(args[0].clone());
            self.release.notified().await;
            Ok(JobOutput {
                success: true,
                ..Default::default()
            })
        }
    }

    fn app_with(runner: Arc<dyn JobRunner>, static_dir: &std::path::Path) -> Router {
        app_with_slots(runner, static_dir, 2)
    }

    fn app_with_slots(runner: Arc<dyn JobRunner>, static_dir: &std::path::Path, slots: usize) -> Router {
        let state = AppState {
            runner,
            jobs: Arc::new(Semaphore::new(slots)),
        };
        crate::app(state, static_dir)
    }

    fn succeeding_runner() -> Arc<RecordingRunner> {
        Arc::new(RecordingRunner {
            output: JobOutput {
                success: true,
                stdout: "Download completed successfully!\n".into(),
                stderr: String::new(),
            },
            ..Default::default()
        })
    }

    async fn post(app: Router, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/download")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_url_is_rejected_without_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let runner = succeeding_runner();
        let (status, body) = post(app_with(runner.clone(), dir.path()), "{}").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "URL is required" }));
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_audio_request_maps_to_audio_flags() {
        let dir = tempfile::tempdir().unwrap();
        let runner = succeeding_runner();
        let (status, body) = post(
            app_with(runner.clone(), dir.path()),
            r#"{"url":"https://example/video","audioOnly":true,"audioFormat":"m4a"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("Download completed successfully!"));
        assert_eq!(body["output"], json!("Download completed successfully!\n"));
        assert_eq!(
            *runner.calls.lock().unwrap(),
            vec![vec!["https://example/video", "-a", "--audio-format", "m4a"]]
        );
    }

    #[tokio::test]
    async fn test_video_request_maps_to_resolution_and_format() {
        let dir = tempfile::tempdir().unwrap();
        let runner = succeeding_runner();
        post(
            app_with(runner.clone(), dir.path()),
            r#"{"url":"https://example/video","resolution":"1080p","format":"webm"}"#,
        )
        .await;

        assert_eq!(
            *runner.calls.lock().unwrap(),
            vec![vec!["https://example/video", "-r", "1080p", "-f", "webm"]]
        );
    }

    #[tokio::test]
    async fn test_failed_job_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner {
            output: JobOutput {
                success: false,
                stdout: String::new(),
                stderr: "invalid resolution".into(),
            },
            ..Default::default()
        });
        let (status, body) = post(app_with(runner, dir.path()), r#"{"url":"u","resolution":"hd"}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "success": false, "error": "Download failed: invalid resolution" })
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = succeeding_runner();
        let (status, body) = post(app_with(runner.clone(), dir.path()), "not json").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = post(app_with(Arc::new(FailingRunner), dir.path()), r#"{"url":"u"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "no such program" }));
    }

    #[tokio::test]
    async fn test_excess_jobs_wait_for_a_free_slot() {
        let dir = tempfile::tempdir().unwrap();
        let (started_tx, mut started) = mpsc::unbounded_channel();
        let runner = Arc::new(GatedRunner {
            started: started_tx,
            release: Notify::new(),
        });
        let app = app_with_slots(runner.clone(), dir.path(), 1);

        let first = tokio::spawn(post(app.clone(), r#"{"url":"first"}"#));
        assert_eq!(started.recv().await.as_deref(), Some("first"));

        let second = tokio::spawn(post(app, r#"{"url":"second"}"#));
        assert!(
            tokio::time::timeout(Duration::from_millis(200), started.recv()).await.is_err(),
            "second job started while the only slot was taken"
        );

        runner.release.notify_one();
        let (status, body) = first.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));

        assert_eq!(started.recv().await.as_deref(), Some("second"));
        runner.release.notify_one();
        let (status, _) = second.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_is_fixed() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(succeeding_runner(), dir.path());
        let request = Request::builder().uri("/api/status").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "status": STATUS_MESSAGE }));
    }

    #[tokio::test]
    async fn test_unknown_paths_fall_back_to_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>app</html>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        let app = app_with(succeeding_runner(), dir.path());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/app.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"console.log(1)");

        let response = app
            .oneshot(Request::builder().uri("/some/route").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<html>app</html>");
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(succeeding_runner(), dir.path());
        let request = Request::builder()
            .uri("/api/status")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }
}
