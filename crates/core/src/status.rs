// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Externally observable state of one supervised service.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::clock::Clock;
use crate::log_buffer::{LogBuffer, LogEntry, LogLevel};
use crate::service::ServiceDescriptor;

/// Supervision state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Initializing,
    Cloning,
    Running,
    Crashed,
    Updating,
    Failed,
}

impl ServiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceStatus::Initializing => "initializing",
            ServiceStatus::Cloning => "cloning",
            ServiceStatus::Running => "running",
            ServiceStatus::Crashed => "crashed",
            ServiceStatus::Updating => "updating",
            ServiceStatus::Failed => "failed",
        }
    }

    /// States in which a child process may legitimately be published.
    pub fn admits_child(self) -> bool {
        matches!(self, ServiceStatus::Running | ServiceStatus::Updating)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one service as published to the status store.
///
/// Owned and mutated by the service's supervisor; everyone else sees
/// immutable published copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub status: ServiceStatus,
    pub url: String,
    pub branch: String,
    pub repo_path: PathBuf,
    pub script_to_run: Option<String>,
    pub service_manager_pid: u32,
    pub script_pid: Option<u32>,
    pub logs: LogBuffer,
}

impl StatusRecord {
    /// Fresh `initializing` record for a service.
    pub fn new(
        descriptor: &ServiceDescriptor,
        repo_path: PathBuf,
        service_manager_pid: u32,
        max_log_entries: usize,
    ) -> Self {
        Self {
            status: ServiceStatus::Initializing,
            url: descriptor.url.clone(),
            branch: descriptor.branch.clone(),
            repo_path,
            script_to_run: None,
            service_manager_pid,
            script_pid: None,
            logs: LogBuffer::new(max_log_entries),
        }
    }

    /// Append a log line stamped with `clock`.
    pub fn log(&mut self, clock: &dyn Clock, level: LogLevel, message: impl Into<String>) {
        self.logs.push(LogEntry { epoch_ms: clock.epoch_ms(), level, message: message.into() });
    }

    /// Move to a state without a child process, clearing `script_pid`.
    pub fn without_child(&mut self, status: ServiceStatus) {
        self.status = status;
        self.script_pid = None;
    }

    /// Enter `running` with the given child.
    pub fn running(&mut self, script: impl Into<String>, pid: Option<u32>) {
        self.status = ServiceStatus::Running;
        self.script_to_run = Some(script.into());
        self.script_pid = pid;
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
