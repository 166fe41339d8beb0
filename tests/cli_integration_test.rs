use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// 在指定目录下运行 `ask --chat`，环境变量清空，配置只能来自 .env
fn run_ask(dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mythiq-agent"))
        .args(["ask", "--chat", "hello"])
        .current_dir(dir)
        .env_clear()
        .output()
        .unwrap()
}

#[test]
fn test_ask_without_dotenv_logs_at_info() {
    let dir = TempDir::new().unwrap();

    let output = run_ask(dir.path());
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("all_providers_exhausted"));
    assert!(stderr.contains("请求失败"));
}

#[test]
fn test_rust_log_from_dotenv_applies() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".env"), "RUST_LOG=off\n").unwrap();

    let output = run_ask(dir.path());
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("all_providers_exhausted"));
    assert!(!stderr.contains("请求失败"), "stderr: {}", stderr);
}
