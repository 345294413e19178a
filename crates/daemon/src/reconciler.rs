// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciliation of declared services against live supervisors.
//!
//! Every tick the desired set (from the services file) is compared with the
//! supervisors the reconciler owns: missing ones are started, undeclared ones
//! are stopped and their records deleted, dead ones are re-created and
//! changed url/branch pairs are forwarded in place.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ax_core::services_file;
use ax_core::{LogLevel, ServiceDescriptor, ServiceStatus, ServicesFileError, StatusRecord};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::supervisor::{self, SupervisorConfig, SupervisorDeps, SupervisorHandle};

/// What one tick changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub started: Vec<PathBuf>,
    pub stopped: Vec<PathBuf>,
    /// Supervisors found dead and re-created
    pub restarted: Vec<PathBuf>,
    pub reconfigured: Vec<PathBuf>,
    /// Supervisors that could not be created; retried next tick
    pub failed: Vec<PathBuf>,
}

impl TickSummary {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
            && self.stopped.is_empty()
            && self.restarted.is_empty()
            && self.reconfigured.is_empty()
            && self.failed.is_empty()
    }
}

pub struct Reconciler {
    repos_dir: PathBuf,
    config: Arc<SupervisorConfig>,
    deps: SupervisorDeps,
    handles: HashMap<PathBuf, SupervisorHandle>,
}

impl Reconciler {
    pub fn new(repos_dir: PathBuf, config: SupervisorConfig, deps: SupervisorDeps) -> Self {
        Self { repos_dir, config: Arc::new(config), deps, handles: HashMap::new() }
    }

    /// Paths with a registered supervisor
    pub fn managed(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.handles.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn handle(&self, path: &Path) -> Option<&SupervisorHandle> {
        self.handles.get(path)
    }

    /// Bring the live supervisors in line with `descriptors`.
    pub async fn tick(&mut self, descriptors: &[ServiceDescriptor]) -> TickSummary {
        let mut summary = TickSummary::default();

        let mut order: Vec<PathBuf> = Vec::new();
        let mut desired: HashMap<PathBuf, &ServiceDescriptor> = HashMap::new();
        for descriptor in descriptors {
            let path = descriptor.resolve(&self.repos_dir);
            if desired.insert(path.clone(), descriptor).is_some() {
                warn!(service = %path.display(), "duplicate service path, using the last entry");
            } else {
                order.push(path);
            }
        }

        // Stop undeclared services before starting new ones.
        let removed: Vec<PathBuf> =
            self.handles.keys().filter(|path| !desired.contains_key(*path)).cloned().collect();
        let mut stopping = Vec::with_capacity(removed.len());
        for path in &removed {
            if let Some(handle) = self.handles.remove(path) {
                info!(service = %path.display(), "service removed from services file, stopping");
                stopping.push(handle);
            }
        }
        stop_all(stopping).await;
        for path in removed {
            self.deps.store.delete(&path);
            summary.stopped.push(path);
        }

        // Records left behind by failed creations whose lines are gone.
        for key in self.deps.store.keys() {
            if !desired.contains_key(&key) && !self.handles.contains_key(&key) {
                debug!(service = %key.display(), "removing stale status record");
                self.deps.store.delete(&key);
            }
        }

        for path in order {
            let Some(descriptor) = desired.get(&path).copied() else {
                continue;
            };
            match self.handles.get(&path).map(SupervisorHandle::is_alive) {
                Some(true) => {
                    if let Some(handle) = self.handles.get_mut(&path) {
                        if handle.reconfigure(descriptor.clone()) {
                            info!(
                                service = %path.display(),
                                url = %descriptor.url,
                                branch = %descriptor.branch,
                                "service reconfigured"
                            );
                            summary.reconfigured.push(path);
                        }
                    }
                }
                Some(false) => {
                    warn!(service = %path.display(), "supervisor exited unexpectedly, restarting");
                    if let Some(dead) = self.handles.remove(&path) {
                        dead.stop().await;
                    }
                    self.deps.store.delete(&path);
                    if self.start(&path, descriptor) {
                        summary.restarted.push(path);
                    } else {
                        summary.failed.push(path);
                    }
                }
                None => {
                    if self.start(&path, descriptor) {
                        summary.started.push(path);
                    } else {
                        summary.failed.push(path);
                    }
                }
            }
        }

        summary
    }

    fn start(&mut self, path: &Path, descriptor: &ServiceDescriptor) -> bool {
        match supervisor::spawn(
            descriptor.clone(),
            path.to_path_buf(),
            Arc::clone(&self.config),
            self.deps.clone(),
        ) {
            Ok(handle) => {
                info!(
                    service = %path.display(),
                    url = %descriptor.url,
                    branch = %descriptor.branch,
                    "starting service"
                );
                self.handles.insert(path.to_path_buf(), handle);
                true
            }
            Err(e) => {
                error!(service = %path.display(), error = %e, "failed to start supervisor");
                let mut record = StatusRecord::new(
                    descriptor,
                    path.to_path_buf(),
                    self.deps.manager_pid,
                    self.config.max_log_entries,
                );
                record.without_child(ServiceStatus::Failed);
                record.log(
                    self.deps.clock.as_ref(),
                    LogLevel::Error,
                    format!("Failed to start service supervisor: {e}"),
                );
                self.deps.store.set(path.to_path_buf(), record);
                false
            }
        }
    }

    /// Tick every `interval` from the services file until `cancel` fires,
    /// then stop every supervisor.
    pub async fn run(mut self, services_file: PathBuf, interval: Duration, cancel: CancellationToken) {
        info!(services_file = %services_file.display(), "reconciler started");
        let mut missing_reported = false;

        loop {
            let descriptors = match services_file::load(&services_file) {
                Ok(parsed) => {
                    missing_reported = false;
                    for line_error in &parsed.errors {
                        warn!(error = %line_error, "skipping services file line");
                    }
                    for warning in &parsed.warnings {
                        warn!(
                            line = warning.line,
                            ignored = ?warning.ignored,
                            "ignoring extra fields in services file"
                        );
                    }
                    Some(parsed.services)
                }
                Err(ServicesFileError::NotFound(path)) => {
                    if !missing_reported {
                        warn!(path = %path.display(), "services file not found, no services to manage");
                        missing_reported = true;
                    }
                    Some(Vec::new())
                }
                Err(e) => {
                    error!(error = %e, "failed to read services file, keeping current services");
                    None
                }
            };

            if let Some(descriptors) = descriptors {
                let summary = self.tick(&descriptors).await;
                if !summary.is_empty() {
                    debug!(?summary, "reconciled");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        self.shutdown().await;
    }

    /// Stop every supervisor (children terminated) and clear their records.
    pub async fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        info!(count = self.handles.len(), "stopping all services");
        let (paths, handles): (Vec<PathBuf>, Vec<SupervisorHandle>) = self.handles.drain().unzip();
        stop_all(handles).await;
        for path in paths {
            self.deps.store.delete(&path);
        }
    }
}

/// Stop supervisors concurrently; each stop is individually bounded.
async fn stop_all(handles: Vec<SupervisorHandle>) {
    let mut set = JoinSet::new();
    for handle in handles {
        set.spawn(handle.stop());
    }
    while let Some(result) = set.join_next().await {
        if let Err(e) = result {
            warn!(error = %e, "supervisor stop task failed");
        }
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
