use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{error, warn};

use super::server::AppState;
use crate::APP_VERSION;
use crate::downloader::{AdmissionError, DownloadOptions};
use crate::parser::extract_url;
use crate::probe::{self, ProbeError};
use crate::settings::SettingsPatch;

// 前端既可以把选项放在 options 里，也可以和 url 平铺在同一层
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub options: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DownloadRequest {
    fn into_parts(self) -> (String, DownloadOptions) {
        let mut merged = self.extra;
        if let Some(options) = self.options {
            merged.extend(options);
        }
        (self.url, DownloadOptions::from(merged))
    }
}

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub cookie: Option<String>,
}

fn failure(message: impl std::fmt::Display) -> Json<Value> {
    Json(json!({
        "success": false,
        "message": message.to_string(),
    }))
}

pub async fn download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Json<Value> {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return failure(rejection.body_text()),
    };

    let (raw_url, mut options) = request.into_parts();
    if raw_url.trim().is_empty() {
        return failure(AdmissionError::EmptyUrl);
    }

    let url = extract_url(&raw_url);
    state.settings.apply_defaults(&mut options).await;

    match state.service.enqueue(&url, options).await {
        Ok(task_id) => Json(json!({
            "success": true,
            "task_id": task_id,
            "message": "下载任务已添加到队列",
        })),
        Err(e) => {
            warn!("拒绝下载请求: {}", e);
            failure(e)
        }
    }
}

pub async fn parse(
    State(state): State<AppState>,
    payload: Result<Json<ParseRequest>, JsonRejection>,
) -> Json<Value> {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return failure(rejection.body_text()),
    };

    if request.url.trim().is_empty() {
        return failure(AdmissionError::EmptyUrl);
    }

    let url = extract_url(&request.url);
    let settings = state.settings.get().await;

    match probe::parse_info(&settings, &url, request.cookie.as_deref()).await {
        Ok(info) => Json(json!({ "success": true, "info": info })),
        Err(ProbeError::Timeout) => failure("解析超时"),
        Err(e) => failure(e),
    }
}

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let limit = state.service.config().active_task_limit;
    let tasks = state.service.list_active_tasks(limit).await;
    Json(json!({ "tasks": tasks }))
}

pub async fn task_log(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Json<Value> {
    match state.service.get_task(&task_id).await {
        Some(snapshot) => Json(json!({
            "log": snapshot.log,
            "status": snapshot.status,
            "progress": snapshot.progress,
        })),
        None => Json(json!({ "log": "", "status": "not_found" })),
    }
}

pub async fn history(State(state): State<AppState>) -> Json<Value> {
    let limit = state.service.config().history_limit;
    let history = state.service.list_history(limit).await;
    Json(json!({ "history": history }))
}

pub async fn clear_history(State(state): State<AppState>) -> Json<Value> {
    state.service.clear_history().await;
    Json(json!({ "success": true, "message": "历史已清空" }))
}

pub async fn get_settings(State(state): State<AppState>) -> Json<Value> {
    let settings = state.settings.get().await;
    Json(json!({ "success": true, "settings": settings }))
}

pub async fn save_settings(
    State(state): State<AppState>,
    payload: Result<Json<SettingsPatch>, JsonRejection>,
) -> Json<Value> {
    let Json(patch) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return failure(rejection.body_text()),
    };

    match state.settings.update(patch).await {
        Ok(_) => Json(json!({ "success": true, "message": "设置已保存" })),
        Err(e) => {
            error!("保存设置失败: {}", e);
            failure(e)
        }
    }
}

pub async fn check_bbdown(State(state): State<AppState>) -> Json<Value> {
    let settings = state.settings.get().await;
    let status = probe::check_bbdown(&settings.bbdown_path).await;
    Json(json!(status))
}

pub async fn test_tools(State(state): State<AppState>) -> Json<Value> {
    let settings = state.settings.get().await;
    let tools = probe::test_tools(&settings).await;
    Json(json!({ "success": true, "tools": tools }))
}

pub async fn version() -> Json<Value> {
    Json(json!({ "version": APP_VERSION }))
}
