#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use bbdown_web::probe::{self, ProbeError};
use bbdown_web::settings::Settings;

// 每个测试用自己的目录，避免并发测试互相覆盖脚本
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bbdown-web-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_script(dir: &PathBuf, name: &str, body: &str, executable: bool) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mode = if executable { 0o755 } else { 0o644 };
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
    path
}

// 用 /bin/sh 充当 BBDown：视频地址位置放脚本路径，sh 会直接执行它
fn sh_settings() -> Settings {
    Settings {
        bbdown_path: "/bin/sh".to_string(),
        ..Settings::default()
    }
}

#[tokio::test]
async fn test_slow_command_hits_deadline() {
    let started = Instant::now();
    let result = probe::run_with_timeout("sh", &["-c", "sleep 5"], Duration::from_millis(200)).await;

    assert!(matches!(result, Err(ProbeError::Timeout)));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(ProbeError::Timeout.to_string(), "执行超时");
}

#[tokio::test]
async fn test_fast_command_returns_output() {
    let output = probe::run_with_timeout("sh", &["-c", "echo ok"], Duration::from_secs(5))
        .await
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok");
}

#[tokio::test]
async fn test_missing_program_is_spawn_error() {
    let result = probe::run_with_timeout(
        "/definitely/not/a/real/program",
        &["--version"],
        Duration::from_secs(1),
    )
    .await;
    assert!(matches!(result, Err(ProbeError::Spawn { .. })));
}

#[tokio::test]
async fn test_parse_info_formats_each_line() {
    let dir = scratch_dir("parse-ok");
    let script = write_script(
        &dir,
        "info.sh",
        r#"echo "视频标题: 测试视频"; echo ""; echo "  args: $*  ""#,
        false,
    );

    let info = probe::parse_info(&sh_settings(), &script.to_string_lossy(), Some(" SESSDATA=x "))
        .await
        .unwrap();

    let lines: Vec<&str> = info.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("[INFO] 视频标题: 测试视频"));
    assert!(lines[1].ends_with("[INFO] args: --only-show-info -c SESSDATA=x"));
}

#[tokio::test]
async fn test_parse_info_failure_carries_stderr() {
    let dir = scratch_dir("parse-bad");
    let script = write_script(&dir, "bad.sh", "echo 'cookie 无效' 1>&2; exit 1", false);

    let result = probe::parse_info(&sh_settings(), &script.to_string_lossy(), None).await;

    match result {
        Err(ProbeError::Failed(message)) => assert!(message.contains("cookie 无效")),
        other => panic!("应当解析失败: {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_check_bbdown_uses_configured_path() {
    let dir = scratch_dir("bbdown-ok");
    let script = write_script(&dir, "BBDown", "echo 'BBDown version 1.6.3'", true);
    let path = script.to_string_lossy().into_owned();

    let status = probe::check_bbdown(&path).await;

    assert!(status.installed);
    assert_eq!(status.path.as_deref(), Some(path.as_str()));
    assert_eq!(status.version.as_deref(), Some("BBDown version 1.6.3"));
    assert!(status.message.is_none());
}

#[tokio::test]
async fn test_check_bbdown_skips_broken_binary() {
    let dir = scratch_dir("bbdown-bad");
    let script = write_script(&dir, "BBDown", "exit 1", true);
    let path = script.to_string_lossy().into_owned();

    let status = probe::check_bbdown(&path).await;

    // 返回非零的候选不算安装成功，其余候选取决于本机环境
    assert_ne!(status.path.as_deref(), Some(path.as_str()));
    if !status.installed {
        assert_eq!(status.message.as_deref(), Some("BBDown未找到"));
    }
}

#[tokio::test]
async fn test_tools_report_versions() {
    let dir = scratch_dir("tools");
    let ffmpeg = write_script(
        &dir,
        "ffmpeg",
        "echo 'ffmpeg version 6.1.1 Copyright (c) 2000-2023'",
        true,
    );
    let settings = Settings {
        ffmpeg_path: ffmpeg.to_string_lossy().into_owned(),
        mp4box_path: "/definitely/not/mp4box".to_string(),
        aria2c_path: "/definitely/not/aria2c".to_string(),
        ..Settings::default()
    };

    let tools = probe::test_tools(&settings).await;

    assert!(tools["FFmpeg"].installed);
    assert_eq!(tools["FFmpeg"].version.as_deref(), Some("6.1.1"));
    assert!(!tools["MP4Box"].installed);
    assert!(!tools["Aria2c"].installed);
}
