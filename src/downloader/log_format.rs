//! 下载日志的格式化：给每一行加上时间戳和级别标记，并从输出中提取进度和标题。
//!
//! 这里全部是纯函数，不涉及 I/O 或任务状态。

use chrono::{Local, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    Error,
    Warn,
    Success,
    Debug,
    Progress,
    Info,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::Error => "ERROR",
            LogTag::Warn => "WARN",
            LogTag::Success => "SUCCESS",
            LogTag::Debug => "DEBUG",
            LogTag::Progress => "PROGRESS",
            LogTag::Info => "INFO",
        }
    }
}

// 英文关键字按小写匹配；"failed" 只认 BBDown 实际输出的两种写法
const ERROR_KEYWORDS: &[&str] = &["error", "错误"];
const ERROR_LITERALS: &[&str] = &["failed", "Failed"];
const WARN_KEYWORDS: &[&str] = &["warning", "警告"];
const SUCCESS_KEYWORDS: &[&str] = &["success", "completed", "成功", "完成", "✅"];
const DEBUG_KEYWORDS: &[&str] = &["debug", "调试"];

lazy_static! {
    static ref PROGRESS_PATTERN: Regex = Regex::new(r"(\d+)%").unwrap();
    static ref TITLE_PATTERN: Regex = Regex::new(r"(?:视频标题|Title)\s*[:：]\s*(.+)").unwrap();
}

/// 按优先级给一行输出分类，先命中的规则生效
pub fn classify(line: &str) -> LogTag {
    let lower = line.to_lowercase();
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if contains_any(ERROR_KEYWORDS) || ERROR_LITERALS.iter().any(|k| line.contains(k)) {
        LogTag::Error
    } else if contains_any(WARN_KEYWORDS) {
        LogTag::Warn
    } else if contains_any(SUCCESS_KEYWORDS) {
        LogTag::Success
    } else if contains_any(DEBUG_KEYWORDS) {
        LogTag::Debug
    } else if line.contains('%') {
        LogTag::Progress
    } else {
        LogTag::Info
    }
}

/// 用当前时间格式化一行日志
pub fn format_log_line(line: &str) -> String {
    format_log_line_at(line, Local::now().time())
}

/// `[HH:MM:SS] [TAG] 原始内容\n`；空行只返回换行符
pub fn format_log_line_at(line: &str, time: NaiveTime) -> String {
    if line.trim().is_empty() {
        return "\n".to_string();
    }

    format!(
        "[{}] [{}] {}\n",
        time.format("%H:%M:%S"),
        classify(line).as_str(),
        line
    )
}

/// 提取一行中最后出现的百分比
pub fn extract_progress(line: &str) -> Option<u32> {
    PROGRESS_PATTERN
        .captures_iter(line)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// 提取 "视频标题:" / "Title:" 后面的内容
pub fn extract_title(line: &str) -> Option<String> {
    let caps = TITLE_PATTERN.captures(line)?;
    let title = caps.get(1)?.as_str().trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}
