#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use bbdown_web::downloader::{DownloadOptions, DownloadService, ServiceConfig, TaskStatus};
use bbdown_web::runner::system::decode_line;
use bbdown_web::runner::{
    CommandBuilder, CommandLine, ProcessRunner, RunnerError, SystemRunner,
};
use tokio_util::sync::CancellationToken;

fn shell(script: &str) -> CommandLine {
    let mut cmd = CommandLine::new("sh", std::env::temp_dir());
    cmd.arg("-c").arg(script);
    cmd
}

#[tokio::test]
async fn test_merges_stdout_and_stderr_lines() {
    let cmd = shell("echo 第一行; echo oops 1>&2; printf '10%%\\r20%%\\r\\n'; printf 'tail'; exit 3");
    let mut process = SystemRunner::new().start(&cmd).await.unwrap();

    let mut lines = Vec::new();
    while let Some(line) = process.next_line().await.unwrap() {
        lines.push(line);
    }
    let code = process.wait().await.unwrap();

    assert_eq!(code, 3);
    assert!(lines.contains(&"第一行".to_string()));
    assert!(lines.contains(&"oops".to_string()));
    assert!(lines.contains(&"10%".to_string()));
    assert!(lines.contains(&"20%".to_string()));
    assert!(lines.contains(&"tail".to_string()));
    // \r\n 只算一次行结束
    assert!(!lines.iter().any(|line| line.is_empty()));
}

#[tokio::test]
async fn test_missing_program_fails_to_start() {
    let cmd = CommandLine::new("/definitely/not/a/real/program", std::env::temp_dir());
    let result = SystemRunner::new().start(&cmd).await;
    assert!(matches!(result, Err(RunnerError::Spawn { .. })));
}

#[test]
fn test_decode_line() {
    assert_eq!(decode_line("下载完成".as_bytes()), "下载完成");
    // 非 UTF-8 的内容不会 panic，也不会丢掉整行
    assert!(!decode_line(&[0xB4, 0xED, 0xCE, 0xF3, b' ', b'4', b'2', b'%']).is_empty());
}

struct ShellBuilder;

impl CommandBuilder for ShellBuilder {
    fn build(&self, url: &str, _options: &DownloadOptions) -> CommandLine {
        shell(url)
    }
}

#[tokio::test]
async fn test_real_process_through_queue() {
    let (service, _handle) = DownloadService::spawn(
        ServiceConfig {
            poll_interval: Duration::from_millis(20),
            ..ServiceConfig::default()
        },
        Arc::new(SystemRunner::new()),
        Arc::new(ShellBuilder),
        CancellationToken::new(),
    );

    let ok = service
        .enqueue("echo 'Title: 真实进程'; echo 'Downloading... 42%'", DownloadOptions::new())
        .await
        .unwrap();
    let bad = service
        .enqueue("echo 'ERROR: nope' 1>&2; exit 1", DownloadOptions::new())
        .await
        .unwrap();

    let wait = |id: String| {
        let service = service.clone();
        async move {
            tokio::time::timeout(Duration::from_secs(10), async {
                loop {
                    let snapshot = service.get_task(&id).await.unwrap();
                    if snapshot.status.is_terminal() {
                        return snapshot;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await
            .unwrap()
        }
    };

    let snapshot = wait(ok).await;
    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(snapshot.progress, 100);
    assert!(snapshot.log.contains("[PROGRESS] Downloading... 42%"));

    let snapshot = wait(bad).await;
    assert_eq!(snapshot.status, TaskStatus::Failed);
    assert!(snapshot.log.contains("[ERROR] ERROR: nope"));
    assert!(snapshot.log.contains("错误码: 1"));

    let active = service.list_active_tasks(10).await;
    assert_eq!(active[1].title, "真实进程");
}
