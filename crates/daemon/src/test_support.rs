// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for daemon tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ax_adapters::{FakeGitAdapter, FakeLauncher};
use ax_core::{FakeClock, ServiceDescriptor, ServiceStatus, StatusRecord, StatusStore};
use tempfile::TempDir;

use crate::supervisor::{SupervisorConfig, SupervisorDeps};

pub const MANAGER_PID: u32 = 4242;

/// Remote tree every fixture starts from
pub const DEFAULT_FILES: [(&str, &str); 2] =
    [("autoexec.txt", "main.py\n"), ("main.py", "print('hello')\n")];

/// Intervals short enough for tests to observe several cycles.
pub fn fast_config() -> SupervisorConfig {
    SupervisorConfig {
        health_check_interval: Duration::from_millis(20),
        git_check_interval: Duration::from_millis(60),
        failure_backoff: Duration::from_millis(20),
        stop_grace: Duration::from_millis(200),
        ..SupervisorConfig::default()
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub repos_dir: PathBuf,
    pub git: FakeGitAdapter,
    pub launcher: FakeLauncher,
    pub clock: FakeClock,
    pub store: StatusStore,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_files(DEFAULT_FILES)
    }

    pub fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repos_dir = dir.path().join("repos");
        Self {
            dir,
            repos_dir,
            git: FakeGitAdapter::with_files(files),
            launcher: FakeLauncher::new(),
            clock: FakeClock::new(),
            store: StatusStore::new(),
        }
    }

    pub fn deps(&self) -> SupervisorDeps {
        SupervisorDeps {
            git: Arc::new(self.git.clone()),
            launcher: Arc::new(self.launcher.clone()),
            clock: Arc::new(self.clock.clone()),
            store: self.store.clone(),
            manager_pid: MANAGER_PID,
        }
    }

    pub fn descriptor(&self, name: &str) -> ServiceDescriptor {
        ServiceDescriptor::new(format!("https://x/{name}.git"))
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.repos_dir.join(name)
    }

    pub fn record(&self, path: &Path) -> Option<Arc<StatusRecord>> {
        self.store.get(path)
    }

    pub fn status(&self, path: &Path) -> Option<ServiceStatus> {
        self.record(path).map(|r| r.status)
    }

    /// Wait until the record at `path` is `running` with a child.
    pub async fn wait_running(&self, path: &Path) -> Arc<StatusRecord> {
        wait_for("service running", || {
            self.record(path).filter(|r| r.status == ServiceStatus::Running && r.script_pid.is_some())
        })
        .await
    }
}

/// Poll `check` until it yields a value, failing the test after 5s.
pub async fn wait_for<T>(what: &str, mut check: impl FnMut() -> Option<T>) -> T {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(value) = check() {
            return value;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Sleep through `n` health intervals of [`fast_config`].
pub async fn settle(n: u32) {
    tokio::time::sleep(fast_config().health_check_interval * n).await;
}

/// Record every distinct status published at `path` until `until` is seen.
pub async fn record_statuses(
    store: &StatusStore,
    path: &Path,
    until: ServiceStatus,
) -> Vec<ServiceStatus> {
    let mut seen: Vec<ServiceStatus> = Vec::new();
    wait_for("status sequence", || {
        if let Some(status) = store.get(path).map(|r| r.status) {
            if seen.last() != Some(&status) {
                seen.push(status);
            }
        }
        (seen.last() == Some(&until)).then_some(())
    })
    .await;
    seen
}
