use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bbdown_web::downloader::{DownloadOptions, DownloadService, ServiceConfig};
use bbdown_web::http::{AppState, router};
use bbdown_web::runner::{CommandBuilder, CommandLine, ScriptedRunner};
use bbdown_web::settings::{Settings, SettingsStore};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

// 记录每次收到的选项，方便检查设置是否被合并进去
#[derive(Default)]
struct RecordingBuilder {
    seen: Mutex<Vec<(String, DownloadOptions)>>,
}

impl CommandBuilder for RecordingBuilder {
    fn build(&self, url: &str, options: &DownloadOptions) -> CommandLine {
        self.seen
            .lock()
            .unwrap()
            .push((url.to_string(), options.clone()));
        let mut cmd = CommandLine::new("fake-bbdown", std::env::temp_dir());
        cmd.arg(url);
        cmd
    }
}

struct TestApp {
    state: AppState,
    runner: Arc<ScriptedRunner>,
    builder: Arc<RecordingBuilder>,
    _shutdown: CancellationToken,
}

fn test_app() -> TestApp {
    let runner = Arc::new(ScriptedRunner::new());
    let builder = Arc::new(RecordingBuilder::default());
    let shutdown = CancellationToken::new();
    let (service, _handle) = DownloadService::spawn(
        ServiceConfig {
            poll_interval: Duration::from_millis(20),
            ..ServiceConfig::default()
        },
        runner.clone(),
        builder.clone(),
        shutdown.clone(),
    );
    let settings = Settings {
        default_dir: "/tmp/bbdown-web-test".to_string(),
        user_agent: "TestAgent/1.0".to_string(),
        ..Settings::default()
    };
    TestApp {
        state: AppState::new(service, Arc::new(SettingsStore::new(settings))),
        runner,
        builder,
        _shutdown: shutdown,
    }
}

async fn send(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> Value {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router(app.state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn wait_for_status(app: &TestApp, task_id: &str, status: &str) -> Value {
    let uri = format!("/api/task/{}/log", task_id);
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let body = send(app, "GET", &uri, None).await;
            if body["status"] == status {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("等待任务状态超时")
}

#[tokio::test]
async fn test_empty_url_is_rejected() {
    let app = test_app();
    let body = send(&app, "POST", "/api/download", Some(json!({ "url": "   " }))).await;

    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "请输入视频地址");
    assert!(app.runner.started().is_empty());
}

#[tokio::test]
async fn test_download_extracts_url_and_merges_settings() {
    let app = test_app();
    app.runner.push_run(["视频标题: 分享的视频", "50%", "100%"], 0);

    let body = send(
        &app,
        "POST",
        "/api/download",
        Some(json!({
            "url": "【分享的视频】 https://www.bilibili.com/video/BV1xx411c7mD 来自手机",
            "quality": "1080P 高清",
            "work_dir": "",
        })),
    )
    .await;

    assert_eq!(body["success"], true);
    let task_id = body["task_id"].as_str().unwrap().to_string();
    assert!(task_id.starts_with("task_"));

    let log = wait_for_status(&app, &task_id, "completed").await;
    assert_eq!(log["progress"], 100);
    assert!(log["log"].as_str().unwrap().contains("[SUCCESS]"));

    let seen = app.builder.seen.lock().unwrap().clone();
    let (url, options) = &seen[0];
    assert_eq!(url, "https://www.bilibili.com/video/BV1xx411c7mD");
    assert_eq!(options.text("quality").as_deref(), Some("1080P 高清"));
    assert_eq!(options.text("work_dir").as_deref(), Some("/tmp/bbdown-web-test"));
    assert_eq!(options.text("user_agent").as_deref(), Some("TestAgent/1.0"));
    assert_eq!(
        options.text("bbdown_path").as_deref(),
        Some("~/.dotnet/tools/BBDown")
    );

    let status = send(&app, "GET", "/api/status", None).await;
    let tasks = status["tasks"].as_array().unwrap();
    assert_eq!(tasks[0]["id"], task_id.as_str());
    assert_eq!(tasks[0]["title"], "分享的视频");
    assert_eq!(tasks[0]["status"], "completed");
}

#[tokio::test]
async fn test_nested_options_override_flat_fields() {
    let app = test_app();
    let body = send(
        &app,
        "POST",
        "/api/download",
        Some(json!({
            "url": "BV1xx411c7mD",
            "quality": "720P",
            "options": { "quality": "4K", "user_agent": "Custom" },
        })),
    )
    .await;
    let task_id = body["task_id"].as_str().unwrap().to_string();
    wait_for_status(&app, &task_id, "completed").await;

    let seen = app.builder.seen.lock().unwrap().clone();
    let (_, options) = &seen[0];
    assert_eq!(options.text("quality").as_deref(), Some("4K"));
    assert_eq!(options.text("user_agent").as_deref(), Some("Custom"));
}

#[tokio::test]
async fn test_failed_download_reports_exit_code() {
    let app = test_app();
    app.runner.push_run(["something failed"], 2);

    let body = send(&app, "POST", "/api/download", Some(json!({ "url": "BV1xx411c7mD" }))).await;
    let task_id = body["task_id"].as_str().unwrap().to_string();

    let log = wait_for_status(&app, &task_id, "failed").await;
    let text = log["log"].as_str().unwrap();
    assert!(text.contains("错误码: 2"));
}

#[tokio::test]
async fn test_unknown_task_log() {
    let app = test_app();
    let body = send(&app, "GET", "/api/task/task_404/log", None).await;
    assert_eq!(body, json!({ "log": "", "status": "not_found" }));
}

#[tokio::test]
async fn test_history_and_clear() {
    let app = test_app();
    for url in ["BV-a", "BV-b"] {
        let body = send(&app, "POST", "/api/download", Some(json!({ "url": url }))).await;
        let task_id = body["task_id"].as_str().unwrap().to_string();
        wait_for_status(&app, &task_id, "completed").await;
    }

    let body = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let body = send(&app, "GET", "/api/history", None).await;
            if body["history"].as_array().unwrap().len() == 2 {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(body["history"][0]["url"], "BV-b");
    assert_eq!(body["history"][0]["status"], "completed");

    let cleared = send(&app, "POST", "/api/history/clear", None).await;
    assert_eq!(cleared["success"], true);

    let body = send(&app, "GET", "/api/history", None).await;
    assert!(body["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_settings_round_trip() {
    let app = test_app();
    let dir = std::env::temp_dir().join("bbdown-web-settings-test");

    let saved = send(
        &app,
        "POST",
        "/api/settings",
        Some(json!({
            "user_agent": "NewAgent",
            "enable_debug": true,
            "default_dir": dir.to_string_lossy(),
        })),
    )
    .await;
    assert_eq!(saved["success"], true);
    assert!(dir.is_dir());

    let body = send(&app, "GET", "/api/settings", None).await;
    assert_eq!(body["settings"]["user_agent"], "NewAgent");
    assert_eq!(body["settings"]["enable_debug"], true);
    assert_eq!(body["settings"]["bbdown_path"], "~/.dotnet/tools/BBDown");
}

#[tokio::test]
async fn test_malformed_body_is_reported_not_raised() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/download")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = router(app.state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_version() {
    let app = test_app();
    let body = send(&app, "GET", "/api/version", None).await;
    assert_eq!(body["version"], bbdown_web::APP_VERSION);
}
