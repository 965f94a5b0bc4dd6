pub mod cli;
pub mod common;
pub mod downloader;
pub mod http;
pub mod parser;
pub mod probe;
pub mod runner;
pub mod settings;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use downloader::{DownloadService, ServiceConfig};
pub use settings::{Settings, SettingsStore};
