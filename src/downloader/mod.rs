use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::runner::{CommandBuilder, ProcessRunner};

pub mod error;
pub mod log_format;
pub mod store;
pub mod task;
pub mod worker;

pub use error::{AdmissionError, WorkerError};
pub use store::TaskStore;
pub use task::{
    DownloadOptions, HistoryEntry, SharedTask, TaskRecord, TaskSnapshot, TaskStatus, TaskSummary,
};
pub use worker::{TaskReceiver, TaskSender, Worker};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub poll_interval: Duration,  // 工作线程检查退出信号的间隔
    pub history_capacity: usize,  // 最多保留的历史记录条数
    pub log_tail_chars: usize,    // 查询日志时返回的最大字符数
    pub active_task_limit: usize, // 任务列表返回的最大条数
    pub history_limit: usize,     // 历史列表返回的最大条数
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            history_capacity: 1000,
            log_tail_chars: 20_000,
            active_task_limit: 10,
            history_limit: 50,
        }
    }
}

/// 下载队列对外的查询和提交接口，可以廉价克隆后在多个请求间共享
#[derive(Clone)]
pub struct DownloadService {
    store: Arc<TaskStore>,
    queue: TaskSender,
    config: Arc<ServiceConfig>,
}

impl DownloadService {
    /// 创建服务但不启动工作线程，返回的接收端交给 [`Worker`]
    pub fn new(config: ServiceConfig) -> (Self, TaskReceiver) {
        let (queue, receiver) = worker::task_queue();
        let service = Self {
            store: Arc::new(TaskStore::new(config.history_capacity)),
            queue,
            config: Arc::new(config),
        };
        (service, receiver)
    }

    /// 创建服务并在当前 tokio 运行时上启动工作线程
    pub fn spawn(
        config: ServiceConfig,
        runner: Arc<dyn ProcessRunner>,
        builder: Arc<dyn CommandBuilder>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (service, receiver) = Self::new(config);
        let worker = Worker::new(
            receiver,
            Arc::clone(&service.store),
            runner,
            builder,
            service.config.poll_interval,
            shutdown,
        );
        let handle = tokio::spawn(worker.run());
        (service, handle)
    }

    pub fn store(&self) -> Arc<TaskStore> {
        Arc::clone(&self.store)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// 创建任务并放入队列，立即返回任务 id，不等待执行
    pub async fn enqueue(
        &self,
        url: &str,
        options: DownloadOptions,
    ) -> Result<String, AdmissionError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AdmissionError::EmptyUrl);
        }

        let task = self.store.create(url, options).await;
        let task_id = task.read().await.id().to_string();

        if self.queue.send(task).is_err() {
            // 工作线程已经退出，撤销刚创建的记录
            self.store.remove(&task_id).await;
            return Err(AdmissionError::QueueClosed);
        }

        info!("下载任务已加入队列: {} -> {}", task_id, url);
        Ok(task_id)
    }

    pub async fn get_task(&self, task_id: &str) -> Option<TaskSnapshot> {
        let snapshot = self.store.snapshot(task_id, self.config.log_tail_chars).await;
        if snapshot.is_none() {
            debug!("查询不存在的任务: {}", task_id);
        }
        snapshot
    }

    pub async fn list_active_tasks(&self, limit: usize) -> Vec<TaskSummary> {
        self.store.list_recent(limit).await
    }

    pub async fn list_history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.store.list_history(limit).await
    }

    pub async fn clear_history(&self) {
        self.store.clear_history().await;
        info!("历史记录已清空");
    }
}
