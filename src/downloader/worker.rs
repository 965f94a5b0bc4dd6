use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::WorkerError;
use super::log_format::format_log_line;
use super::store::TaskStore;
use super::task::{SharedTask, TaskStatus};
use crate::runner::{CommandBuilder, ProcessRunner};

pub type TaskSender = mpsc::UnboundedSender<SharedTask>;
pub type TaskReceiver = mpsc::UnboundedReceiver<SharedTask>;

const SEPARATOR: &str = "========================================";
const BANNER_START: &str = "========== 开始新的下载任务 ==========";
const BANNER_END: &str = "========== 任务结束 ==========";

pub fn task_queue() -> (TaskSender, TaskReceiver) {
    mpsc::unbounded_channel()
}

/// 唯一的下载消费者：按入队顺序一次执行一个任务
pub struct Worker {
    receiver: TaskReceiver,
    store: Arc<TaskStore>,
    runner: Arc<dyn ProcessRunner>,
    builder: Arc<dyn CommandBuilder>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(
        receiver: TaskReceiver,
        store: Arc<TaskStore>,
        runner: Arc<dyn ProcessRunner>,
        builder: Arc<dyn CommandBuilder>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            store,
            runner,
            builder,
            poll_interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!("下载工作线程已启动");

        loop {
            if self.shutdown.is_cancelled() {
                info!("收到退出信号，下载工作线程停止");
                break;
            }

            // 带超时的等待，保证能及时看到退出信号
            let task = match tokio::time::timeout(self.poll_interval, self.receiver.recv()).await
            {
                Err(_) => continue,
                Ok(None) => {
                    info!("下载队列已关闭，工作线程退出");
                    break;
                }
                Ok(Some(task)) => task,
            };

            self.process(task).await;
        }
    }

    // 单个任务的任何错误都只影响这个任务本身
    async fn process(&self, task: SharedTask) {
        let task_id = task.read().await.id().to_string();

        let result = match AssertUnwindSafe(self.execute(&task)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(WorkerError::Panic(panic_message(panic.as_ref()))),
        };

        let mut record = task.write().await;
        if let Err(e) = result {
            error!("任务 {} 执行出错: {}", task_id, e);
            record.force_failed();
            record.append_log(&format_log_line(&format!("❌ 系统错误: {}", e)));
        }
        record.append_log(&format_log_line(BANNER_END));
        record.append_log("\n");

        let entry = record.history_entry();
        drop(record);
        self.store.push_history(entry).await;
    }

    async fn execute(&self, task: &SharedTask) -> Result<(), WorkerError> {
        let (task_id, url, options) = {
            let mut record = task.write().await;
            record.advance(TaskStatus::Downloading);
            (
                record.id().to_string(),
                record.url().to_string(),
                record.options().clone(),
            )
        };
        self.store.ensure_registered(task).await;

        let cmd = self.builder.build(&url, &options);
        info!("开始下载任务: {} ({})", task_id, url);
        debug!("执行命令: {} (目录 {})", cmd.display(), cmd.work_dir.display());

        {
            let mut record = task.write().await;
            record.append_log(&format_log_line(BANNER_START));
            record.append_log(&format_log_line(&format!("视频URL: {}", url)));
            record.append_log(&format_log_line(&format!(
                "下载目录: {}",
                cmd.work_dir.display()
            )));
            record.append_log(&format_log_line(&format!("执行命令: {}", cmd.display())));
            record.append_log(&format_log_line(SEPARATOR));
            record.append_log("\n");
        }

        tokio::fs::create_dir_all(&cmd.work_dir)
            .await
            .map_err(|source| WorkerError::WorkDir {
                path: cmd.work_dir.clone(),
                source,
            })?;

        let mut process = self.runner.start(&cmd).await?;

        // 每一行作为一个整体追加，读者不会看到半行
        while let Some(line) = process.next_line().await? {
            let formatted = format_log_line(&line);
            let mut record = task.write().await;
            record.append_log(&formatted);
            record.observe_output(&line);
        }

        let exit_code = process.wait().await?;

        let mut record = task.write().await;
        record.append_log("\n");
        record.append_log(&format_log_line(SEPARATOR));
        if exit_code == 0 {
            record.advance(TaskStatus::Completed);
            record.set_progress(100);
            record.append_log(&format_log_line("✅ 下载任务完成！"));
            info!("✅ 下载任务完成: {}", task_id);
        } else {
            record.advance(TaskStatus::Failed);
            record.append_log(&format_log_line(&format!(
                "❌ 下载失败，错误码: {}",
                exit_code
            )));
            warn!("下载任务失败: {}, 返回码: {}", task_id, exit_code);
        }

        Ok(())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "未知错误".to_string()
    }
}
