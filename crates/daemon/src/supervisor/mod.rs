// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-service supervision.
//!
//! Each declared service gets one supervisor task that owns the service's
//! working copy, its child process and its status record. The reconciler
//! only ever talks to a supervisor through its [`SupervisorHandle`].

mod machine;
mod script;

pub use script::{discover_script, ScriptError};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ax_adapters::{GitAdapter, GitError, ProcessError, ProcessLauncher};
use ax_core::{Clock, ServiceDescriptor, StatusRecord, StatusStore, DEFAULT_MAX_LOG_ENTRIES};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, warn};

use machine::ServiceSupervisor;

/// Slack on top of `stop_grace` before a stopping task is aborted.
pub const STOP_MARGIN: Duration = Duration::from_secs(2);

/// Timing and launch settings shared by every supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Delay between health checks of a running child
    pub health_check_interval: Duration,
    /// Minimum time between two fetches of the remote
    pub git_check_interval: Duration,
    /// Delay before retrying after a failed cycle
    pub failure_backoff: Duration,
    /// How long a child gets to exit after SIGTERM
    pub stop_grace: Duration,
    pub max_log_entries: usize,
    /// Program the script is handed to
    pub interpreter: String,
    /// File at the repository root naming the script
    pub script_file: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(5),
            git_check_interval: Duration::from_secs(30),
            failure_backoff: Duration::from_secs(5),
            stop_grace: Duration::from_secs(5),
            max_log_entries: DEFAULT_MAX_LOG_ENTRIES,
            interpreter: "python3".to_string(),
            script_file: "autoexec.txt".to_string(),
        }
    }
}

/// Collaborators a supervisor drives.
#[derive(Clone)]
pub struct SupervisorDeps {
    pub git: Arc<dyn GitAdapter>,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub clock: Arc<dyn Clock>,
    pub store: StatusStore,
    /// Reported as `service_manager_pid` in every record
    pub manager_pid: u32,
}

/// Errors that end a supervision cycle. The supervisor marks itself
/// `failed` and retries; none of these reach the reconciler.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to prepare {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to clone repository: {0}")]
    Clone(#[source] GitError),

    #[error("failed to pull updates: {0}")]
    Pull(#[source] GitError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("failed to start script: {0}")]
    Launch(#[source] ProcessError),
}

/// Start supervising `descriptor` at `path`.
///
/// The `initializing` record is published before this returns. Fails only
/// when the repository's parent directory cannot be created.
pub fn spawn(
    descriptor: ServiceDescriptor,
    path: PathBuf,
    config: Arc<SupervisorConfig>,
    deps: SupervisorDeps,
) -> Result<SupervisorHandle, SupervisorError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|source| SupervisorError::Prepare { path: parent.to_path_buf(), source })?;
    }

    let record =
        StatusRecord::new(&descriptor, path.clone(), deps.manager_pid, config.max_log_entries);
    deps.store.set(path.clone(), record.clone());

    let (updates, updates_rx) = watch::channel(descriptor.clone());
    let cancel = CancellationToken::new();
    let stop_timeout = config.stop_grace + STOP_MARGIN;

    let supervisor =
        ServiceSupervisor::new(path.clone(), descriptor.clone(), config, deps, record, updates_rx);
    let task = tokio::spawn(supervisor.run(cancel.clone()));

    Ok(SupervisorHandle {
        path,
        descriptor,
        updates,
        _cancel_on_drop: cancel.clone().drop_guard(),
        cancel,
        task,
        stop_timeout,
    })
}

/// The reconciler's side of a running supervisor.
///
/// Dropping the handle cancels the supervisor; [`stop`](Self::stop) also
/// waits for it to wind down.
pub struct SupervisorHandle {
    path: PathBuf,
    descriptor: ServiceDescriptor,
    updates: watch::Sender<ServiceDescriptor>,
    cancel: CancellationToken,
    _cancel_on_drop: DropGuard,
    task: JoinHandle<()>,
    stop_timeout: Duration,
}

impl SupervisorHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Descriptor most recently handed to the supervisor
    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    /// False once the task has finished, whether by panic or otherwise.
    pub fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    /// Forward a changed url/branch. Returns false (and sends nothing) when
    /// `descriptor` has the same source as the current one.
    pub fn reconfigure(&mut self, descriptor: ServiceDescriptor) -> bool {
        if descriptor.same_source(&self.descriptor) {
            return false;
        }
        self.descriptor = descriptor.clone();
        // The receiver lives as long as the task; a finished task is
        // replaced by the reconciler.
        let _ = self.updates.send(descriptor);
        true
    }

    /// Cancel the supervisor and wait for it to terminate its child.
    ///
    /// Bounded by `stop_grace + STOP_MARGIN`, after which the task is
    /// aborted and its child killed on drop.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        match tokio::time::timeout(self.stop_timeout, &mut self.task).await {
            Ok(Ok(())) => debug!(service = %self.path.display(), "supervisor stopped"),
            Ok(Err(e)) if e.is_panic() => {
                error!(service = %self.path.display(), "supervisor panicked")
            }
            Ok(Err(_)) => {}
            Err(_) => {
                warn!(
                    service = %self.path.display(),
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "supervisor did not stop in time, aborting"
                );
                self.task.abort();
                let _ = (&mut self.task).await;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn abort(&self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
