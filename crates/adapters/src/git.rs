// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Version-control adapter.
//!
//! The supervisor only needs a handful of operations against one working
//! copy; [`CliGitAdapter`] implements them by driving the `git` binary with
//! bounded timeouts.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::subprocess::{
    run_with_timeout, SubprocessError, GIT_CLONE_TIMEOUT, GIT_LOCAL_TIMEOUT, GIT_NETWORK_TIMEOUT,
};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeGitAdapter, GitCall};

/// Errors from version-control operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),

    #[error("git {command} failed: {stderr}")]
    Failed { command: &'static str, stderr: String },

    #[error("git {command} returned unexpected output: {output}")]
    UnexpectedOutput { command: &'static str, output: String },

    #[error("failed to prepare {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Operations on a service's working copy
#[async_trait]
pub trait GitAdapter: Send + Sync + 'static {
    /// Whether a working copy exists at `path`
    async fn exists(&self, path: &Path) -> bool;

    /// Clone `url` at `branch` into `path`.
    ///
    /// A failed clone leaves nothing behind at `path` unless the directory
    /// already existed beforehand.
    async fn clone_repo(&self, url: &str, branch: &str, path: &Path) -> Result<(), GitError>;

    /// Update remote-tracking refs
    async fn fetch(&self, path: &Path) -> Result<(), GitError>;

    /// True only when `origin/<branch>` has commits the checkout lacks
    async fn is_ahead(&self, path: &Path, branch: &str) -> Result<bool, GitError>;

    /// Bring the checkout up to `origin/<branch>`
    async fn pull(&self, path: &Path, branch: &str) -> Result<(), GitError>;

    /// Point `origin` at a new URL
    async fn set_remote_url(&self, path: &Path, url: &str) -> Result<(), GitError>;

    /// Version string of the underlying tool
    async fn version(&self) -> Result<String, GitError>;
}

/// [`GitAdapter`] backed by the `git` binary on `PATH`.
#[derive(Debug, Clone)]
pub struct CliGitAdapter {
    program: PathBuf,
}

impl CliGitAdapter {
    pub fn new() -> Self {
        Self { program: PathBuf::from("git") }
    }

    /// Use a specific `git` binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    fn command(&self, cwd: Option<&Path>) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(cwd) = cwd {
            cmd.arg("-C").arg(cwd);
        }
        // Never block on a credential prompt, and never inherit a caller's
        // repository overrides.
        cmd.env("GIT_TERMINAL_PROMPT", "0").env_remove("GIT_DIR").env_remove("GIT_WORK_TREE");
        cmd
    }

    async fn run(
        &self,
        cmd: Command,
        timeout: Duration,
        command: &'static str,
    ) -> Result<String, GitError> {
        let label = format!("git {command}");
        let output = run_with_timeout(cmd, timeout, &label).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GitError::Failed { command, stderr });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for CliGitAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitAdapter for CliGitAdapter {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path.join(".git")).await.is_ok()
    }

    async fn clone_repo(&self, url: &str, branch: &str, path: &Path) -> Result<(), GitError> {
        let existed = tokio::fs::metadata(path).await.is_ok();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| GitError::Io { path: parent.to_path_buf(), source })?;
        }

        let mut cmd = self.command(None);
        cmd.args(["clone", "--quiet", "--branch", branch, "--", url]).arg(path);
        let result = self.run(cmd, GIT_CLONE_TIMEOUT, "clone").await;

        if result.is_err() && !existed {
            if let Err(e) = tokio::fs::remove_dir_all(path).await {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove partial clone");
                }
            }
        }
        result.map(drop)
    }

    async fn fetch(&self, path: &Path) -> Result<(), GitError> {
        let mut cmd = self.command(Some(path));
        cmd.args(["fetch", "--quiet", "origin"]);
        self.run(cmd, GIT_NETWORK_TIMEOUT, "fetch").await.map(drop)
    }

    async fn is_ahead(&self, path: &Path, branch: &str) -> Result<bool, GitError> {
        let mut cmd = self.command(Some(path));
        cmd.args(["rev-list", "--count"]).arg(format!("HEAD..origin/{branch}"));
        let output = self.run(cmd, GIT_LOCAL_TIMEOUT, "rev-list").await?;
        let count: u64 = output
            .parse()
            .map_err(|_| GitError::UnexpectedOutput { command: "rev-list", output })?;
        Ok(count > 0)
    }

    async fn pull(&self, path: &Path, branch: &str) -> Result<(), GitError> {
        // Switch first so a reconfigured branch is picked up; git creates a
        // local tracking branch from origin when one does not exist yet.
        let mut checkout = self.command(Some(path));
        checkout.args(["checkout", "--quiet", branch]);
        self.run(checkout, GIT_LOCAL_TIMEOUT, "checkout").await?;

        let mut cmd = self.command(Some(path));
        cmd.args(["pull", "--quiet", "--ff-only", "origin", branch]);
        self.run(cmd, GIT_NETWORK_TIMEOUT, "pull").await.map(drop)
    }

    async fn set_remote_url(&self, path: &Path, url: &str) -> Result<(), GitError> {
        let mut cmd = self.command(Some(path));
        cmd.args(["remote", "set-url", "origin", url]);
        self.run(cmd, GIT_LOCAL_TIMEOUT, "remote set-url").await.map(drop)
    }

    async fn version(&self) -> Result<String, GitError> {
        let mut cmd = self.command(None);
        cmd.arg("--version");
        self.run(cmd, GIT_LOCAL_TIMEOUT, "--version").await
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
