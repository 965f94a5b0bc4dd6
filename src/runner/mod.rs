//! 外部进程执行层。
//!
//! 工作线程只通过 [`ProcessRunner`] / [`RunningProcess`] 这两个接口和外部进程打交道，
//! 测试里可以换成 [`scripted::ScriptedRunner`] 回放预设的输出和返回码。

pub mod command;
pub mod error;
pub mod scripted;
pub mod system;

use async_trait::async_trait;

pub use command::{BBDownCommandBuilder, CommandBuilder, CommandLine};
pub use error::RunnerError;
pub use scripted::ScriptedRunner;
pub use system::SystemRunner;

// 启动外部命令，返回一个可以逐行读取输出的句柄
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn start(&self, cmd: &CommandLine) -> Result<Box<dyn RunningProcess>, RunnerError>;
}

// 正在运行的进程：stdout 和 stderr 合并为一个按行的流
#[async_trait]
pub trait RunningProcess: Send {
    /// 读取下一行输出（不含换行符）。进程关闭输出后返回 `Ok(None)`。
    async fn next_line(&mut self) -> Result<Option<String>, RunnerError>;

    /// 等待进程退出并返回退出码。被信号终止的进程返回 -1。
    async fn wait(self: Box<Self>) -> Result<i32, RunnerError>;
}
