use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use super::task::{
    DownloadOptions, HistoryEntry, SharedTask, TaskRecord, TaskSnapshot, TaskSummary,
};

/// 任务状态表和历史记录，进程内共享，重启后不保留
#[derive(Debug)]
pub struct TaskStore {
    tasks: DashMap<String, SharedTask>, // task_id -> Task
    order: Mutex<Vec<String>>,          // 按创建顺序排列的 task_id
    history: Mutex<VecDeque<HistoryEntry>>,
    history_capacity: usize,
    last_id: AtomicU64,
}

impl TaskStore {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            tasks: DashMap::new(),
            order: Mutex::new(Vec::new()),
            history: Mutex::new(VecDeque::new()),
            history_capacity: history_capacity.max(1),
            last_id: AtomicU64::new(0),
        }
    }

    // 以毫秒时间戳为基础生成 id，同一毫秒内的多次调用顺延，保证严格递增
    fn next_task_id(&self) -> String {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut prev = self.last_id.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self.last_id.compare_exchange_weak(
                prev,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return format!("task_{}", candidate),
                Err(actual) => prev = actual,
            }
        }
    }

    /// 创建一个 pending 状态的任务并登记
    pub async fn create(&self, url: &str, options: DownloadOptions) -> SharedTask {
        let mut order = self.order.lock().await;
        let id = self.next_task_id();
        let task = Arc::new(RwLock::new(TaskRecord::new(id.clone(), url, options)));
        self.tasks.insert(id.clone(), Arc::clone(&task));
        order.push(id);
        task
    }

    /// 登记一个已有任务，已经存在时什么也不做
    pub async fn ensure_registered(&self, task: &SharedTask) {
        let id = task.read().await.id().to_string();
        if self.tasks.contains_key(&id) {
            return;
        }
        let mut order = self.order.lock().await;
        self.tasks.insert(id.clone(), Arc::clone(task));
        order.push(id);
    }

    pub async fn remove(&self, task_id: &str) {
        let mut order = self.order.lock().await;
        if self.tasks.remove(task_id).is_some() {
            order.retain(|id| id != task_id);
        }
    }

    pub fn get(&self, task_id: &str) -> Option<SharedTask> {
        self.tasks.get(task_id).map(|entry| Arc::clone(entry.value()))
    }

    pub async fn snapshot(&self, task_id: &str, log_limit: usize) -> Option<TaskSnapshot> {
        let task = self.get(task_id)?;
        let record = task.read().await;
        Some(record.snapshot(log_limit))
    }

    /// 最近创建的任务，最新的在前
    pub async fn list_recent(&self, limit: usize) -> Vec<TaskSummary> {
        let ids: Vec<String> = {
            let order = self.order.lock().await;
            order.iter().rev().take(limit).cloned().collect()
        };

        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.get(&id) {
                summaries.push(task.read().await.summary());
            }
        }
        summaries
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// 追加历史记录，超出容量时丢弃最旧的
    pub async fn push_history(&self, entry: HistoryEntry) {
        let mut history = self.history.lock().await;
        history.push_back(entry);
        while history.len() > self.history_capacity {
            history.pop_front();
        }
    }

    /// 最近的历史记录，最新的在前
    pub async fn list_history(&self, limit: usize) -> Vec<HistoryEntry> {
        let history = self.history.lock().await;
        history.iter().rev().take(limit).cloned().collect()
    }

    pub async fn clear_history(&self) {
        let mut history = self.history.lock().await;
        *history = VecDeque::new();
    }
}
