// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded execution of short-lived helper commands.

use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// `git clone` of a fresh repository
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(300);
/// `git fetch` / `git pull`
pub const GIT_NETWORK_TIMEOUT: Duration = Duration::from_secs(120);
/// Local-only queries (`rev-list`, `remote set-url`, `--version`)
pub const GIT_LOCAL_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{label}: failed to start: {source}")]
    Spawn {
        label: String,
        #[source]
        source: io::Error,
    },

    #[error("{label}: timed out after {}s", timeout.as_secs())]
    Timeout { label: String, timeout: Duration },

    #[error("{label}: {source}")]
    Wait {
        label: String,
        #[source]
        source: io::Error,
    },
}

/// Run `cmd` to completion, capturing output, killing it if it outlives
/// `timeout`.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &str,
) -> Result<Output, SubprocessError> {
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

    let child =
        cmd.spawn().map_err(|source| SubprocessError::Spawn { label: label.to_string(), source })?;

    // On timeout the child future is dropped, and kill_on_drop reaps it.
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SubprocessError::Wait { label: label.to_string(), source }),
        Err(_) => Err(SubprocessError::Timeout { label: label.to_string(), timeout }),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
