//! 有时限的同步探测：工具版本检查和只解析不下载的信息查询。
//! 这些操作直接在请求里完成，不经过下载队列。

use std::collections::BTreeMap;
use std::process::{Output, Stdio};
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::common::utils::expand_tilde;
use crate::downloader::log_format::format_log_line;
use crate::runner::system::decode_line;
use crate::settings::{DEFAULT_BBDOWN_PATH, Settings};

pub const PARSE_TIMEOUT: Duration = Duration::from_secs(30);
pub const BBDOWN_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const TOOL_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

lazy_static! {
    static ref FFMPEG_VERSION: Regex = Regex::new(r"ffmpeg version ([\d.]+)").unwrap();
    static ref ARIA2_VERSION: Regex = Regex::new(r"aria2 version ([\d.]+)").unwrap();
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("执行超时")]
    Timeout,

    #[error("无法启动 {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Failed(String),
}

/// 执行命令并收集输出，超过时限时杀掉进程
pub async fn run_with_timeout(
    program: &str,
    args: &[&str],
    deadline: Duration,
) -> Result<Output, ProbeError> {
    debug!("探测命令: {} {:?} (时限 {:?})", program, args, deadline);

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(deadline, child).await {
        Err(_) => Err(ProbeError::Timeout),
        Ok(Err(source)) => Err(ProbeError::Spawn {
            program: program.to_string(),
            source,
        }),
        Ok(Ok(output)) => Ok(output),
    }
}

fn resolve_bbdown(path: &str) -> String {
    let expanded = expand_tilde(path);
    if expanded.exists() {
        expanded.to_string_lossy().into_owned()
    } else {
        "BBDown".to_string()
    }
}

/// 只解析视频信息，不下载。成功时返回格式化后的输出
pub async fn parse_info(
    settings: &Settings,
    url: &str,
    cookie: Option<&str>,
) -> Result<String, ProbeError> {
    let program = resolve_bbdown(&settings.bbdown_path);
    let mut args = vec![url, "--only-show-info"];
    if let Some(cookie) = cookie.map(str::trim).filter(|c| !c.is_empty()) {
        args.extend(["-c", cookie]);
    }
    if settings.enable_debug {
        args.push("--debug");
    }

    let output = run_with_timeout(&program, &args, PARSE_TIMEOUT).await?;

    if output.status.success() {
        let stdout = decode_line(&output.stdout);
        let info = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(format_log_line)
            .collect::<String>();
        Ok(info)
    } else {
        let message = if output.stderr.is_empty() {
            decode_line(&output.stdout)
        } else {
            decode_line(&output.stderr)
        };
        Err(ProbeError::Failed(message))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BBDownStatus {
    pub installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 依次尝试几个常见的 BBDown 位置，返回第一个能正常输出版本号的
pub async fn check_bbdown(configured_path: &str) -> BBDownStatus {
    let candidates = [
        configured_path,
        "BBDown",
        "/usr/local/bin/BBDown",
        DEFAULT_BBDOWN_PATH,
    ];

    for candidate in candidates {
        let path = expand_tilde(candidate).to_string_lossy().into_owned();
        match run_with_timeout(&path, &["--version"], BBDOWN_PROBE_TIMEOUT).await {
            Ok(output) if output.status.success() => {
                return BBDownStatus {
                    installed: true,
                    path: Some(path),
                    version: Some(decode_line(&output.stdout).trim().to_string()),
                    message: None,
                };
            }
            Ok(_) => debug!("{} --version 返回非零", path),
            Err(e) => debug!("{} 不可用: {}", path, e),
        }
    }

    BBDownStatus {
        installed: false,
        path: None,
        version: None,
        message: Some("BBDown未找到".to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ToolStatus {
    fn missing() -> Self {
        Self {
            installed: false,
            version: None,
        }
    }
}

async fn probe_tool(program: &str, flag: &str, version_pattern: Option<&Regex>) -> ToolStatus {
    match run_with_timeout(program, &[flag], TOOL_PROBE_TIMEOUT).await {
        Ok(output) if output.status.success() => {
            let version = match version_pattern {
                Some(pattern) => pattern
                    .captures(&decode_line(&output.stdout))
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| "Unknown".to_string()),
                None => "Installed".to_string(),
            };
            ToolStatus {
                installed: true,
                version: Some(version),
            }
        }
        _ => ToolStatus::missing(),
    }
}

fn tool_path(configured: &str, fallback: &str) -> String {
    if configured.is_empty() {
        fallback.to_string()
    } else {
        expand_tilde(configured).to_string_lossy().into_owned()
    }
}

/// 检测 FFmpeg / MP4Box / Aria2c 是否可用
pub async fn test_tools(settings: &Settings) -> BTreeMap<String, ToolStatus> {
    let ffmpeg = tool_path(&settings.ffmpeg_path, "ffmpeg");
    let mp4box = tool_path(&settings.mp4box_path, "mp4box");
    let aria2c = tool_path(&settings.aria2c_path, "aria2c");

    let (ffmpeg, mp4box, aria2c) = tokio::join!(
        probe_tool(&ffmpeg, "-version", Some(&*FFMPEG_VERSION)),
        probe_tool(&mp4box, "-version", None),
        probe_tool(&aria2c, "--version", Some(&*ARIA2_VERSION)),
    );

    let mut tools = BTreeMap::new();
    tools.insert("FFmpeg".to_string(), ffmpeg);
    tools.insert("MP4Box".to_string(), mp4box);
    tools.insert("Aria2c".to_string(), aria2c);
    tools
}
