use std::sync::Arc;

use anyhow::Context;
use bbdown_web::cli::Cli;
use bbdown_web::common::logger::PrettyLogger;
use bbdown_web::common::utils::expand_tilde;
use bbdown_web::http::{self, AppState};
use bbdown_web::runner::{BBDownCommandBuilder, SystemRunner};
use bbdown_web::{APP_VERSION, DownloadService, ServiceConfig, SettingsStore};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(if args.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    // 创建默认下载目录
    let default_dir = expand_tilde(&args.default_dir);
    tokio::fs::create_dir_all(&default_dir)
        .await
        .with_context(|| format!("无法创建默认下载目录: {}", default_dir.display()))?;

    let settings = Arc::new(SettingsStore::new(args.initial_settings()));
    let config = ServiceConfig {
        history_capacity: args.history_capacity,
        ..ServiceConfig::default()
    };

    // 启动下载工作线程
    let shutdown = CancellationToken::new();
    let (service, worker) = DownloadService::spawn(
        config,
        Arc::new(SystemRunner::new()),
        Arc::new(BBDownCommandBuilder::new(&default_dir)),
        shutdown.clone(),
    );

    let addr = args.listen_addr();
    PrettyLogger::startup_banner(
        APP_VERSION,
        default_dir.to_string_lossy(),
        format!("localhost:{}", addr.port()),
    );

    let state = AppState::new(service, settings);
    let result = http::serve(addr, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("监听退出信号失败: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    PrettyLogger::warning("正在退出...");
    shutdown.cancel();
    if let Err(e) = worker.await {
        error!("下载工作线程异常退出: {}", e);
    }
    info!("已退出");

    result.with_context(|| format!("HTTP 服务运行失败: {}", addr))
}
