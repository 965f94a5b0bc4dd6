use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::log_format::{extract_progress, extract_title};
use crate::common::utils::tail_chars;

/// 被工作线程和查询接口共享的任务
pub type SharedTask = Arc<RwLock<TaskRecord>>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    // 状态只能向前推进: pending -> downloading -> completed | failed
    fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Downloading)
                | (TaskStatus::Downloading, TaskStatus::Completed)
                | (TaskStatus::Downloading, TaskStatus::Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 透传给命令构建器的下载选项，队列本身不解读其中的内容。
///
/// 前端提交的值可能是字符串、布尔或数字，读取时统一做宽松转换。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadOptions(Map<String, Value>);

impl DownloadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// 非空字符串或数字，空字符串视为未设置
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// 布尔开关；键不存在时返回 None
    pub fn flag(&self, key: &str) -> Option<bool> {
        let value = self.0.get(key)?;
        Some(match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            Value::String(s) => {
                let s = s.trim().to_ascii_lowercase();
                !(s.is_empty() || matches!(s.as_str(), "false" | "0" | "off" | "no"))
            }
            Value::Null => false,
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        })
    }

    /// 键存在且为真
    pub fn is_set(&self, key: &str) -> bool {
        self.flag(key).unwrap_or(false)
    }
}

impl From<Map<String, Value>> for DownloadOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// 一个下载任务的全部可变状态
#[derive(Debug, Clone)]
pub struct TaskRecord {
    id: String,
    url: String,
    options: DownloadOptions,
    status: TaskStatus,
    start_time: String,
    log: String,
    title: String,
    progress: u32,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>, url: impl Into<String>, options: DownloadOptions) -> Self {
        let url = url.into();
        Self {
            id: id.into(),
            title: url.clone(),
            url,
            options,
            status: TaskStatus::Pending,
            start_time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            log: String::new(),
            progress: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn start_time(&self) -> &str {
        &self.start_time
    }

    pub fn log(&self) -> &str {
        &self.log
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn progress(&self) -> u32 {
        self.progress
    }

    /// 推进状态，非法的转换会被忽略并返回 false
    pub fn advance(&mut self, next: TaskStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// 处理过程中出现意外错误时强制置为失败，已经结束的任务保持不变
    pub fn force_failed(&mut self) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::Failed;
        }
    }

    pub fn append_log(&mut self, chunk: &str) {
        self.log.push_str(chunk);
    }

    pub fn set_progress(&mut self, progress: u32) {
        self.progress = progress;
    }

    /// 根据一行原始输出更新进度和标题。后出现的百分比直接覆盖之前的值
    pub fn observe_output(&mut self, raw_line: &str) {
        if let Some(progress) = extract_progress(raw_line) {
            self.progress = progress;
        }
        if let Some(title) = extract_title(raw_line) {
            self.title = title;
        }
    }

    pub fn snapshot(&self, log_limit: usize) -> TaskSnapshot {
        TaskSnapshot {
            log: tail_chars(&self.log, log_limit).to_string(),
            status: self.status,
            progress: self.progress,
        }
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id.clone(),
            url: self.url.clone(),
            title: self.title.clone(),
            status: self.status,
            start_time: self.start_time.clone(),
            progress: self.progress,
        }
    }

    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            title: self.title.clone(),
            url: self.url.clone(),
            time: self.start_time.clone(),
            status: self.status,
        }
    }
}

/// 查询单个任务时返回的只读快照，日志只保留末尾部分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub log: String,
    pub status: TaskStatus,
    pub progress: u32,
}

// 任务列表里的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    pub url: String,
    pub title: String,
    pub status: TaskStatus,
    pub start_time: String,
    pub progress: u32,
}

// 任务结束时的历史快照，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub title: String,
    pub url: String,
    pub time: String,
    pub status: TaskStatus,
}
