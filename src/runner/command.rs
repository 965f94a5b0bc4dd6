use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::common::utils::expand_tilde;
use crate::downloader::task::DownloadOptions;

const FALLBACK_BBDOWN: &str = "BBDown";

// 一条完整的待执行命令
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
}

impl CommandLine {
    pub fn new(program: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: work_dir.into(),
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn arg_pair(&mut self, flag: &str, value: impl Into<String>) -> &mut Self {
        self.args.push(flag.to_string());
        self.args.push(value.into());
        self
    }

    /// 日志里展示用的简短形式：只保留前三段，避免把 cookie 之类的参数写进日志
    pub fn display(&self) -> String {
        let tokens: Vec<&str> = std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect();

        if tokens.len() > 3 {
            format!("{}...", tokens[..3].join(" "))
        } else {
            tokens.join(" ")
        }
    }
}

/// 把 (url, 选项) 转换成可执行的命令
pub trait CommandBuilder: Send + Sync {
    fn build(&self, url: &str, options: &DownloadOptions) -> CommandLine;
}

// BBDown 命令构建器
#[derive(Debug, Clone)]
pub struct BBDownCommandBuilder {
    default_dir: PathBuf,
}

impl BBDownCommandBuilder {
    pub fn new(default_dir: impl AsRef<Path>) -> Self {
        Self {
            default_dir: default_dir.as_ref().to_path_buf(),
        }
    }

    fn resolve_program(options: &DownloadOptions) -> String {
        match options.text("bbdown_path") {
            Some(path) => {
                let expanded = expand_tilde(&path);
                if expanded.exists() {
                    expanded.to_string_lossy().into_owned()
                } else {
                    // 配置的路径不存在时交给 PATH 查找
                    FALLBACK_BBDOWN.to_string()
                }
            }
            None => FALLBACK_BBDOWN.to_string(),
        }
    }

    fn resolve_work_dir(&self, options: &DownloadOptions) -> PathBuf {
        match options.text("work_dir") {
            Some(dir) if !dir.trim().is_empty() => expand_tilde(dir.trim()),
            _ => self.default_dir.clone(),
        }
    }
}

impl CommandBuilder for BBDownCommandBuilder {
    fn build(&self, url: &str, options: &DownloadOptions) -> CommandLine {
        let work_dir = self.resolve_work_dir(options);
        let mut cmd = CommandLine::new(Self::resolve_program(options), work_dir.clone());
        cmd.arg(url);

        if let Some(cookie) = options.text("cookie") {
            let cookie = cookie.trim();
            if !cookie.is_empty() {
                cmd.arg_pair("-c", cookie);
            }
        }

        if let Some(quality) = options.text("quality") {
            cmd.arg_pair("-q", quality);
        }
        if let Some(encoding) = options.text("encoding") {
            cmd.arg_pair("-e", encoding);
        }
        if let Some(page) = options.text("select_page") {
            cmd.arg_pair("-p", page);
        }

        match options.text("api_mode").as_deref() {
            Some("tv") => {
                cmd.arg("--use-tv-api");
            }
            Some("app") => {
                cmd.arg("--use-app-api");
            }
            Some("intl") => {
                cmd.arg("--use-intl-api");
            }
            _ => {}
        }

        // 非数字的间隔直接忽略
        if let Some(delay) = options
            .text("delay_per_page")
            .and_then(|d| d.trim().parse::<i64>().ok())
            .filter(|d| *d > 0)
        {
            cmd.arg_pair("--delay-per-page", delay.to_string());
        }

        if options.is_set("download_danmaku") {
            cmd.arg("--download-danmaku");
        }
        if options.is_set("video_only") {
            cmd.arg("--video-only");
        }
        if options.is_set("audio_only") {
            cmd.arg("--audio-only");
        }
        if options.is_set("use_aria2") {
            cmd.arg("--use-aria2c");
            if let Some(path) = options.text("aria2c_path") {
                cmd.arg_pair("--aria2c-path", expand_tilde(&path).to_string_lossy());
            }
        }
        if options.is_set("skip_mux") {
            cmd.arg("--skip-mux");
        }
        if options.is_set("force_http") {
            cmd.arg("--force-http");
        }
        if options.is_set("show_all") {
            cmd.arg("--show-all");
        }
        if options.is_set("use_mp4box") {
            cmd.arg("--use-mp4box");
            if let Some(path) = options.text("mp4box_path") {
                cmd.arg_pair("--mp4box-path", expand_tilde(&path).to_string_lossy());
            }
        }

        // 字幕和封面默认下载
        if !options.flag("download_subtitle").unwrap_or(true) {
            cmd.arg("--skip-subtitle");
        }
        if !options.flag("download_cover").unwrap_or(true) {
            cmd.arg("--skip-cover");
        }

        if options.is_set("debug") {
            cmd.arg("--debug");
        }
        if let Some(ua) = options.text("user_agent") {
            cmd.arg_pair("-ua", ua);
        }
        if let Some(path) = options.text("ffmpeg_path") {
            cmd.arg_pair("--ffmpeg-path", expand_tilde(&path).to_string_lossy());
        }
        if let Some(host) = options.text("upos_host") {
            cmd.arg_pair("--upos-host", host);
        }
        if let Some(pattern) = options.text("file_pattern") {
            cmd.arg_pair("-F", pattern);
        }

        cmd.arg_pair("--work-dir", work_dir.to_string_lossy());
        cmd
    }
}
