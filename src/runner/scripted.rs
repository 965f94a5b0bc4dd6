//! 回放预设输出的假执行器，用于在不调用真实下载工具的情况下驱动工作线程。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{CommandLine, ProcessRunner, RunnerError, RunningProcess};

#[derive(Debug, Clone)]
enum Script {
    Run {
        lines: Vec<String>,
        exit_code: i32,
        gate: Option<Arc<Notify>>,
    },
    SpawnFailure(String),
}

/// 每次 `start` 按入队顺序取出一个脚本；脚本用完后默认输出空内容并以 0 退出。
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    scripts: Mutex<VecDeque<Script>>,
    started: Mutex<Vec<CommandLine>>,
    line_delay: Duration,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每输出一行前等待的时间
    pub fn with_line_delay(mut self, delay: Duration) -> Self {
        self.line_delay = delay;
        self
    }

    pub fn push_run<I, S>(&self, lines: I, exit_code: i32)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Script::Run {
            lines: lines.into_iter().map(Into::into).collect(),
            exit_code,
            gate: None,
        });
    }

    /// 输出完所有行后挂起，直到返回的 `Notify` 被触发才结束输出
    pub fn push_gated<I, S>(&self, lines: I, exit_code: i32) -> Arc<Notify>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let gate = Arc::new(Notify::new());
        self.push(Script::Run {
            lines: lines.into_iter().map(Into::into).collect(),
            exit_code,
            gate: Some(Arc::clone(&gate)),
        });
        gate
    }

    /// 模拟可执行文件不存在之类的启动失败
    pub fn push_spawn_failure(&self, message: impl Into<String>) {
        self.push(Script::SpawnFailure(message.into()));
    }

    /// 已经被启动过的命令，按启动顺序排列
    pub fn started(&self) -> Vec<CommandLine> {
        self.started
            .lock()
            .map(|started| started.clone())
            .unwrap_or_default()
    }

    fn push(&self, script: Script) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.push_back(script);
        }
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn start(&self, cmd: &CommandLine) -> Result<Box<dyn RunningProcess>, RunnerError> {
        if let Ok(mut started) = self.started.lock() {
            started.push(cmd.clone());
        }

        let script = self
            .scripts
            .lock()
            .ok()
            .and_then(|mut scripts| scripts.pop_front());

        match script {
            Some(Script::SpawnFailure(message)) => Err(RunnerError::Spawn {
                program: cmd.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message),
            }),
            Some(Script::Run {
                lines,
                exit_code,
                gate,
            }) => Ok(Box::new(ScriptedProcess {
                lines: lines.into(),
                exit_code,
                gate,
                line_delay: self.line_delay,
            })),
            None => Ok(Box::new(ScriptedProcess {
                lines: VecDeque::new(),
                exit_code: 0,
                gate: None,
                line_delay: self.line_delay,
            })),
        }
    }
}

struct ScriptedProcess {
    lines: VecDeque<String>,
    exit_code: i32,
    gate: Option<Arc<Notify>>,
    line_delay: Duration,
}

#[async_trait]
impl RunningProcess for ScriptedProcess {
    async fn next_line(&mut self) -> Result<Option<String>, RunnerError> {
        if let Some(line) = self.lines.pop_front() {
            if !self.line_delay.is_zero() {
                tokio::time::sleep(self.line_delay).await;
            }
            return Ok(Some(line));
        }

        if let Some(gate) = self.gate.take() {
            gate.notified().await;
        }
        Ok(None)
    }

    async fn wait(self: Box<Self>) -> Result<i32, RunnerError> {
        Ok(self.exit_code)
    }
}
