use std::process::Stdio;

use async_trait::async_trait;
use chardetng::EncodingDetector;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{CommandLine, ProcessRunner, RunnerError, RunningProcess};

const READ_CHUNK_SIZE: usize = 4096;

type LineResult = Result<String, std::io::Error>;

/// 使用 `tokio::process` 执行真实的外部命令
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn start(&self, cmd: &CommandLine) -> Result<Box<dyn RunningProcess>, RunnerError> {
        debug!("启动外部进程: {} (工作目录: {:?})", cmd.program, cmd.work_dir);

        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .current_dir(&cmd.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: cmd.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(RunnerError::MissingPipe)?;
        let stderr = child.stderr.take().ok_or(RunnerError::MissingPipe)?;

        // stdout 和 stderr 各自一个读取任务，按到达顺序汇入同一个通道
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(forward_lines(stdout, tx.clone()));
        tokio::spawn(forward_lines(stderr, tx));

        Ok(Box::new(SystemProcess { child, lines: rx }))
    }
}

struct SystemProcess {
    child: Child,
    lines: mpsc::UnboundedReceiver<LineResult>,
}

#[async_trait]
impl RunningProcess for SystemProcess {
    async fn next_line(&mut self) -> Result<Option<String>, RunnerError> {
        match self.lines.recv().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(RunnerError::Read(e)),
            None => Ok(None),
        }
    }

    async fn wait(mut self: Box<Self>) -> Result<i32, RunnerError> {
        let status = self.child.wait().await.map_err(RunnerError::Wait)?;
        Ok(status.code().unwrap_or(-1))
    }
}

// 把一个管道切分成行发送出去。`\r` 也算作行结束，
// 下载工具用它原地刷新进度，`\r\n` 只算一次
async fn forward_lines<R>(mut reader: R, tx: mpsc::UnboundedSender<LineResult>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let mut pending: Vec<u8> = Vec::new();
    let mut last_was_cr = false;

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(n) => n,
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        };

        if n == 0 {
            if !pending.is_empty() {
                let _ = tx.send(Ok(decode_line(&pending)));
            }
            return;
        }

        for &byte in &chunk[..n] {
            match byte {
                b'\n' if last_was_cr => {
                    last_was_cr = false;
                }
                b'\n' | b'\r' => {
                    if tx.send(Ok(decode_line(&pending))).is_err() {
                        return;
                    }
                    pending.clear();
                    last_was_cr = byte == b'\r';
                }
                _ => {
                    last_was_cr = false;
                    pending.push(byte);
                }
            }
        }
    }
}

/// 把一行原始字节解码为字符串。非 UTF-8 的内容交给编码探测处理
pub fn decode_line(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!("输出行解码时发现错误 (编码: {})", encoding.name());
    }
    decoded.into_owned()
}
