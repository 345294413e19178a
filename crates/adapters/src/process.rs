// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process adapter.
//!
//! Each launched script runs in its own process group so termination
//! reaches anything it forked. Children are killed when their handle is
//! dropped, so a supervisor task that dies never leaves an unmonitored
//! process behind.

use std::fmt;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::process::{Child, Command};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeLauncher, FakeProcessInfo};

/// Errors from process operations
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: Errno,
    },

    #[error("failed to wait for process: {0}")]
    Wait(#[source] io::Error),
}

/// What to run and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args: Vec::new(), cwd: cwd.into() }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A launched child
#[async_trait]
pub trait RunningProcess: Send {
    /// OS process id, if the process has not been reaped yet
    fn pid(&self) -> Option<u32>;

    /// Non-blocking liveness check; reaps the child if it has exited
    fn is_alive(&mut self) -> bool;

    /// How the process ended, once `is_alive` has observed the exit
    fn exit_summary(&self) -> Option<String>;

    /// Ask the process to stop, escalating to a forced kill after `grace`.
    ///
    /// Returns once the process is gone.
    async fn terminate(&mut self, grace: Duration) -> Result<(), ProcessError>;
}

/// Launches child processes
#[async_trait]
pub trait ProcessLauncher: Send + Sync + 'static {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<Box<dyn RunningProcess>, ProcessError>;
}

/// [`ProcessLauncher`] for real OS processes
#[derive(Debug, Clone, Copy, Default)]
pub struct OsLauncher;

#[async_trait]
impl ProcessLauncher for OsLauncher {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<Box<dyn RunningProcess>, ProcessError> {
        let mut std_cmd = std::process::Command::new(&spec.program);
        std_cmd
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .process_group(0);
        let mut cmd = Command::from(std_cmd);
        cmd.kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|source| ProcessError::Spawn { program: spec.program.clone(), source })?;
        let pid = child.id();
        tracing::debug!(?pid, command = %spec, cwd = %spec.cwd.display(), "spawned child process");
        Ok(Box::new(OsProcess { child, pid, exit: None }))
    }
}

struct OsProcess {
    child: Child,
    pid: Option<u32>,
    exit: Option<ExitStatus>,
}

impl OsProcess {
    fn signal_group(&self, signal: Signal) -> Result<(), ProcessError> {
        let Some(pid) = self.pid else { return Ok(()) };
        let Ok(raw) = i32::try_from(pid) else { return Ok(()) };
        match killpg(Pid::from_raw(raw), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(source) => Err(ProcessError::Signal { pid, source }),
        }
    }
}

#[async_trait]
impl RunningProcess for OsProcess {
    fn pid(&self) -> Option<u32> {
        if self.exit.is_some() {
            None
        } else {
            self.pid
        }
    }

    fn is_alive(&mut self) -> bool {
        if self.exit.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.exit = Some(status);
                false
            }
            Err(e) => {
                tracing::warn!(pid = ?self.pid, error = %e, "failed to poll child process");
                false
            }
        }
    }

    fn exit_summary(&self) -> Option<String> {
        self.exit.map(|status| status.to_string())
    }

    async fn terminate(&mut self, grace: Duration) -> Result<(), ProcessError> {
        if !self.is_alive() {
            // Take down anything the exited child left in its group.
            let _ = self.signal_group(Signal::SIGKILL);
            return Ok(());
        }

        self.signal_group(Signal::SIGTERM)?;
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.exit = Some(status);
                let _ = self.signal_group(Signal::SIGKILL);
                return Ok(());
            }
            Ok(Err(e)) => return Err(ProcessError::Wait(e)),
            Err(_) => {
                tracing::warn!(
                    pid = ?self.pid,
                    grace_ms = grace.as_millis() as u64,
                    "child ignored SIGTERM, killing"
                );
            }
        }

        self.signal_group(Signal::SIGKILL)?;
        let status = self.child.wait().await.map_err(ProcessError::Wait)?;
        self.exit = Some(status);
        Ok(())
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
