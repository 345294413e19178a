// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory remote for supervisor tests.
//!
//! The fake models a single remote tree with a revision counter. Clones and
//! pulls materialize the remote files on disk (so script discovery reads real
//! files) and record the revision each checkout is at.

use super::{GitAdapter, GitError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Recorded git operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    Clone { url: String, branch: String, path: PathBuf },
    Fetch { path: PathBuf },
    IsAhead { path: PathBuf, branch: String },
    Pull { path: PathBuf, branch: String },
    SetRemoteUrl { path: PathBuf, url: String },
}

#[derive(Default)]
struct FakeGitState {
    files: BTreeMap<String, String>,
    remote_rev: u64,
    checkouts: HashMap<PathBuf, u64>,
    clone_failures: usize,
    fetch_failures: usize,
    pull_failures: usize,
    latency: Duration,
    calls: Vec<GitCall>,
}

/// Fake [`GitAdapter`] backed by an in-memory remote
#[derive(Clone, Default)]
pub struct FakeGitAdapter {
    inner: Arc<Mutex<FakeGitState>>,
}

impl FakeGitAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote whose tree starts with `files` (relative path, contents)
    pub fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let fake = Self::new();
        {
            let mut state = fake.inner.lock();
            for (name, contents) in files {
                state.files.insert(name.to_string(), contents.to_string());
            }
        }
        fake
    }

    /// Commit `files` on the remote, advancing it past every checkout.
    pub fn push<'a>(&self, files: impl IntoIterator<Item = (&'a str, &'a str)>) {
        let mut state = self.inner.lock();
        for (name, contents) in files {
            state.files.insert(name.to_string(), contents.to_string());
        }
        state.remote_rev += 1;
    }

    pub fn fail_next_clones(&self, count: usize) {
        self.inner.lock().clone_failures = count;
    }

    pub fn fail_next_fetches(&self, count: usize) {
        self.inner.lock().fetch_failures = count;
    }

    pub fn fail_next_pulls(&self, count: usize) {
        self.inner.lock().pull_failures = count;
    }

    /// Delay every operation by `latency` so intermediate states are observable.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    pub fn calls(&self) -> Vec<GitCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clone_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, GitCall::Clone { .. })).count()
    }

    pub fn pull_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, GitCall::Pull { .. })).count()
    }

    /// Revision the checkout at `path` is on, if it is known
    pub fn checkout_rev(&self, path: &Path) -> Option<u64> {
        self.inner.lock().checkouts.get(path).copied()
    }

    pub fn remote_rev(&self) -> u64 {
        self.inner.lock().remote_rev
    }

    async fn delay(&self) {
        let latency = self.inner.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

fn failed(command: &'static str) -> GitError {
    GitError::Failed { command, stderr: "injected failure".to_string() }
}

fn write_tree(path: &Path, files: &BTreeMap<String, String>) -> Result<(), GitError> {
    let io_err = |source| GitError::Io { path: path.to_path_buf(), source };
    std::fs::create_dir_all(path.join(".git")).map_err(io_err)?;
    for (name, contents) in files {
        let file = path.join(name);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&file, contents).map_err(io_err)?;
    }
    Ok(())
}

#[async_trait]
impl GitAdapter for FakeGitAdapter {
    async fn exists(&self, path: &Path) -> bool {
        self.delay().await;
        if !path.join(".git").exists() {
            return false;
        }
        // Checkouts created outside the fake start at the current remote rev.
        let mut state = self.inner.lock();
        let rev = state.remote_rev;
        state.checkouts.entry(path.to_path_buf()).or_insert(rev);
        true
    }

    async fn clone_repo(&self, url: &str, branch: &str, path: &Path) -> Result<(), GitError> {
        self.delay().await;
        let mut state = self.inner.lock();
        state.calls.push(GitCall::Clone {
            url: url.to_string(),
            branch: branch.to_string(),
            path: path.to_path_buf(),
        });
        if state.clone_failures > 0 {
            state.clone_failures -= 1;
            return Err(failed("clone"));
        }
        write_tree(path, &state.files)?;
        let rev = state.remote_rev;
        state.checkouts.insert(path.to_path_buf(), rev);
        Ok(())
    }

    async fn fetch(&self, path: &Path) -> Result<(), GitError> {
        self.delay().await;
        let mut state = self.inner.lock();
        state.calls.push(GitCall::Fetch { path: path.to_path_buf() });
        if state.fetch_failures > 0 {
            state.fetch_failures -= 1;
            return Err(failed("fetch"));
        }
        Ok(())
    }

    async fn is_ahead(&self, path: &Path, branch: &str) -> Result<bool, GitError> {
        self.delay().await;
        let mut state = self.inner.lock();
        state.calls.push(GitCall::IsAhead { path: path.to_path_buf(), branch: branch.to_string() });
        let local = state.checkouts.get(path).copied().unwrap_or(state.remote_rev);
        Ok(local < state.remote_rev)
    }

    async fn pull(&self, path: &Path, branch: &str) -> Result<(), GitError> {
        self.delay().await;
        let mut state = self.inner.lock();
        state.calls.push(GitCall::Pull { path: path.to_path_buf(), branch: branch.to_string() });
        if state.pull_failures > 0 {
            state.pull_failures -= 1;
            return Err(failed("pull"));
        }
        write_tree(path, &state.files)?;
        let rev = state.remote_rev;
        state.checkouts.insert(path.to_path_buf(), rev);
        Ok(())
    }

    async fn set_remote_url(&self, path: &Path, url: &str) -> Result<(), GitError> {
        self.delay().await;
        self.inner.lock().calls.push(GitCall::SetRemoteUrl {
            path: path.to_path_buf(),
            url: url.to_string(),
        });
        Ok(())
    }

    async fn version(&self) -> Result<String, GitError> {
        Ok("git version 0.0.0-fake".to_string())
    }
}
