use std::fs;
use std::sync::Arc;
use std::time::Duration;

use ferry_core::{Config, Threshold};
use ferry_daemon::paths::pid_file_path;
use ferry_daemon::{run, PidFile, ServiceState};
use nix::sys::signal::{raise, Signal};
use tempfile::TempDir;

#[tokio::test]
async fn sigterm_removes_pid_file_and_stops_the_loop() {
    let home = TempDir::new().expect("home");
    let a = TempDir::new().expect("a");
    let b = TempDir::new().expect("b");
    fs::write(a.path().join("fresh.txt"), b"x").expect("write");

    let pid_path = pid_file_path(home.path());
    let pid_file = PidFile::create(&pid_path).expect("pid file");
    let state = Arc::new(ServiceState::new(home.path(), pid_file));
    let config = Config {
        source: a.path().to_path_buf(),
        destination: b.path().to_path_buf(),
        poll_interval: Duration::from_secs(3600),
        threshold: Threshold(2),
    };

    let task = tokio::spawn(run(state.clone(), config));
    for _ in 0..500 {
        if state.handler_installed() && b.path().join("fresh.txt").exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(state.handler_installed(), "handler never installed");
    assert!(b.path().join("fresh.txt").exists(), "first cycle never ran");

    raise(Signal::SIGTERM).expect("raise SIGTERM");
    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("daemon stopped after SIGTERM")
        .expect("join");
    outcome.expect("clean shutdown");
    assert!(!PidFile::is_present(&pid_path), "PID file removed on SIGTERM");

    // The handler stays registered, so a repeat signal is absorbed.
    raise(Signal::SIGTERM).expect("raise SIGTERM again");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!PidFile::is_present(&pid_path));
}
