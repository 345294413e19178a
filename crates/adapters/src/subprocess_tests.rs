// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn captures_output() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "echo hello; echo oops >&2"]);
    let output = run_with_timeout(cmd, Duration::from_secs(5), "echo").await.unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "oops");
}

#[tokio::test]
async fn times_out() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "sleep 30"]);
    let err = run_with_timeout(cmd, Duration::from_millis(100), "sleep").await.unwrap_err();
    assert!(matches!(err, SubprocessError::Timeout { .. }), "got {err}");
    assert_eq!(err.to_string(), "sleep: timed out after 0s");
}

#[tokio::test]
async fn missing_program_is_spawn_error() {
    let cmd = Command::new("definitely-not-a-real-program-ax");
    let err = run_with_timeout(cmd, Duration::from_secs(1), "missing").await.unwrap_err();
    assert!(matches!(err, SubprocessError::Spawn { .. }), "got {err}");
}
