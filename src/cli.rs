use std::net::{IpAddr, SocketAddr};

use clap::Parser;

use crate::settings::{DEFAULT_BBDOWN_PATH, DEFAULT_WORK_DIR, Settings};

/// BBDown 的本地 Web 前端
#[derive(Parser, Debug)]
#[command(name = "bbdown-web")]
#[command(version)]
#[command(author = "rpeng252@gmail.com")]
#[command(about = "BBDown 的本地 Web 前端：排队下载、实时日志和历史记录", long_about = None)]
pub struct Cli {
    /// 监听地址
    #[arg(long, env = "BBDOWN_WEB_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// 监听端口
    #[arg(long, env = "BBDOWN_WEB_PORT", default_value_t = 5555)]
    pub port: u16,

    /// 默认下载目录
    #[arg(long, value_name = "DIR", env = "BBDOWN_WEB_DEFAULT_DIR")]
    #[arg(default_value = DEFAULT_WORK_DIR)]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub default_dir: String,

    /// BBDown 可执行文件路径
    #[arg(long, value_name = "PATH", env = "BBDOWN_WEB_BBDOWN_PATH")]
    #[arg(default_value = DEFAULT_BBDOWN_PATH)]
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub bbdown_path: String,

    /// 内存中最多保留的历史记录条数
    #[arg(long, env = "BBDOWN_WEB_HISTORY_CAPACITY", default_value_t = 1000)]
    pub history_capacity: usize,

    /// 输出调试日志，并默认给 BBDown 加上 --debug
    #[arg(long, env = "BBDOWN_WEB_DEBUG")]
    pub debug: bool,
}

impl Cli {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// 用命令行参数生成初始设置
    pub fn initial_settings(&self) -> Settings {
        Settings {
            bbdown_path: self.bbdown_path.clone(),
            default_dir: self.default_dir.clone(),
            enable_debug: self.debug,
            ..Settings::default()
        }
    }
}
