use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::handlers;
use crate::downloader::DownloadService;
use crate::settings::SettingsStore;

/// 所有请求处理函数共享的状态
#[derive(Clone)]
pub struct AppState {
    pub service: DownloadService,
    pub settings: Arc<SettingsStore>,
}

impl AppState {
    pub fn new(service: DownloadService, settings: Arc<SettingsStore>) -> Self {
        Self { service, settings }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/download", post(handlers::download))
        .route("/api/parse", post(handlers::parse))
        .route("/api/status", get(handlers::status))
        .route("/api/task/{task_id}/log", get(handlers::task_log))
        .route("/api/history", get(handlers::history))
        .route("/api/history/clear", post(handlers::clear_history))
        .route(
            "/api/settings",
            get(handlers::get_settings).post(handlers::save_settings),
        )
        .route("/api/check-bbdown", get(handlers::check_bbdown))
        .route("/api/test-tools", get(handlers::test_tools))
        .route("/api/version", get(handlers::version))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 监听地址并处理请求，直到 `shutdown` 完成
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP 服务已启动: http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
