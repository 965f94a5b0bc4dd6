use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use crate::common::utils::expand_tilde;
use crate::downloader::DownloadOptions;

pub const DEFAULT_BBDOWN_PATH: &str = "~/.dotnet/tools/BBDown";
pub const DEFAULT_WORK_DIR: &str = "~/Downloads/BBDown-Web";

// 入队时如果请求里没有给出，就用设置里的值补上
const INHERITED_TEXT_KEYS: &[&str] = &[
    "bbdown_path",
    "ffmpeg_path",
    "mp4box_path",
    "user_agent",
    "upos_host",
];

/// 全局设置，只保存在内存中
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub bbdown_path: String,
    pub default_dir: String,
    pub aria2c_path: String,
    pub ffmpeg_path: String,
    pub mp4box_path: String,
    pub user_agent: String,
    pub upos_host: String,
    pub enable_debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bbdown_path: DEFAULT_BBDOWN_PATH.to_string(),
            default_dir: DEFAULT_WORK_DIR.to_string(),
            aria2c_path: String::new(),
            ffmpeg_path: String::new(),
            mp4box_path: String::new(),
            user_agent: String::new(),
            upos_host: String::new(),
            enable_debug: false,
        }
    }
}

impl Settings {
    fn text_value(&self, key: &str) -> &str {
        match key {
            "bbdown_path" => &self.bbdown_path,
            "default_dir" => &self.default_dir,
            "aria2c_path" => &self.aria2c_path,
            "ffmpeg_path" => &self.ffmpeg_path,
            "mp4box_path" => &self.mp4box_path,
            "user_agent" => &self.user_agent,
            "upos_host" => &self.upos_host,
            _ => "",
        }
    }
}

/// 部分更新，未出现的字段保持原值
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub bbdown_path: Option<String>,
    pub default_dir: Option<String>,
    pub aria2c_path: Option<String>,
    pub ffmpeg_path: Option<String>,
    pub mp4box_path: Option<String>,
    pub user_agent: Option<String>,
    pub upos_host: Option<String>,
    pub enable_debug: Option<bool>,
}

#[derive(Debug, Default)]
pub struct SettingsStore {
    inner: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    pub async fn get(&self) -> Settings {
        self.inner.read().await.clone()
    }

    /// 应用部分更新；给出了下载目录时顺便创建它
    pub async fn update(&self, patch: SettingsPatch) -> std::io::Result<Settings> {
        if let Some(dir) = &patch.default_dir {
            tokio::fs::create_dir_all(expand_tilde(dir)).await?;
        }

        let mut settings = self.inner.write().await;
        let SettingsPatch {
            bbdown_path,
            default_dir,
            aria2c_path,
            ffmpeg_path,
            mp4box_path,
            user_agent,
            upos_host,
            enable_debug,
        } = patch;

        if let Some(v) = bbdown_path {
            settings.bbdown_path = v;
        }
        if let Some(v) = default_dir {
            settings.default_dir = v;
        }
        if let Some(v) = aria2c_path {
            settings.aria2c_path = v;
        }
        if let Some(v) = ffmpeg_path {
            settings.ffmpeg_path = v;
        }
        if let Some(v) = mp4box_path {
            settings.mp4box_path = v;
        }
        if let Some(v) = user_agent {
            settings.user_agent = v;
        }
        if let Some(v) = upos_host {
            settings.upos_host = v;
        }
        if let Some(v) = enable_debug {
            settings.enable_debug = v;
        }

        info!("设置已更新");
        Ok(settings.clone())
    }

    /// 把全局设置合并进一次下载请求的选项
    pub async fn apply_defaults(&self, options: &mut DownloadOptions) {
        let settings = self.inner.read().await;

        for key in INHERITED_TEXT_KEYS {
            if !options.is_set(key) {
                options.insert(*key, Value::String(settings.text_value(key).to_string()));
            }
        }
        if !options.is_set("debug") {
            options.insert("debug", settings.enable_debug);
        }

        let has_work_dir = options
            .text("work_dir")
            .is_some_and(|dir| !dir.trim().is_empty());
        if !has_work_dir {
            options.insert("work_dir", settings.default_dir.clone());
        }
    }
}
