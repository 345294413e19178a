// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervision loop for one service.

use std::path::PathBuf;
use std::sync::Arc;

use ax_adapters::{LaunchSpec, RunningProcess};
use ax_core::{LogLevel, ServiceDescriptor, ServiceStatus, StatusRecord};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::script::discover_script;
use super::{SupervisorConfig, SupervisorDeps, SupervisorError};

pub(super) struct ServiceSupervisor {
    path: PathBuf,
    descriptor: ServiceDescriptor,
    config: Arc<SupervisorConfig>,
    deps: SupervisorDeps,
    record: StatusRecord,
    child: Option<Box<dyn RunningProcess>>,
    repo_ready: bool,
    next_update_check: Instant,
    updates: watch::Receiver<ServiceDescriptor>,
}

impl ServiceSupervisor {
    pub(super) fn new(
        path: PathBuf,
        descriptor: ServiceDescriptor,
        config: Arc<SupervisorConfig>,
        deps: SupervisorDeps,
        record: StatusRecord,
        updates: watch::Receiver<ServiceDescriptor>,
    ) -> Self {
        Self {
            path,
            descriptor,
            config,
            deps,
            record,
            child: None,
            repo_ready: false,
            // An existing checkout is examined on the first cycle.
            next_update_check: Instant::now(),
            updates,
        }
    }

    pub(super) async fn run(mut self, cancel: CancellationToken) {
        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.cycle() => result,
            };
            let delay = match result {
                Ok(()) => self.config.health_check_interval,
                Err(e) => {
                    self.fail(e).await;
                    self.config.failure_backoff
                }
            };
            self.publish();

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        self.shutdown().await;
    }

    /// One health/update pass. Errors leave the service `failed` until the
    /// next attempt after `failure_backoff`.
    async fn cycle(&mut self) -> Result<(), SupervisorError> {
        self.apply_reconfiguration().await;

        if !self.repo_ready {
            self.prepare_repo().await?;
        }

        if self.update_available().await {
            self.update().await;
        } else if let Some(child) = self.child.as_mut() {
            if !child.is_alive() {
                let exit = child.exit_summary().unwrap_or_else(|| "unknown exit".to_string());
                // Reap whatever the script left running in its process group.
                if let Err(e) = child.terminate(self.config.stop_grace).await {
                    warn!(
                        service = %self.path.display(),
                        error = %e,
                        "failed to clean up crashed script"
                    );
                }
                self.child = None;
                self.record.without_child(ServiceStatus::Crashed);
                self.emit(
                    LogLevel::Warning,
                    format!("Script terminated unexpectedly ({exit}). Restarting..."),
                );
                self.publish();
            }
        }

        if self.child.is_none() {
            self.launch().await?;
        }
        Ok(())
    }

    /// Use the checkout at `path`, cloning it first if there is none.
    async fn prepare_repo(&mut self) -> Result<(), SupervisorError> {
        if self.deps.git.exists(&self.path).await {
            self.repo_ready = true;
            return Ok(());
        }

        self.record.without_child(ServiceStatus::Cloning);
        self.emit(
            LogLevel::Info,
            format!("Cloning {} (branch {})...", self.descriptor.url, self.descriptor.branch),
        );
        self.publish();

        self.deps
            .git
            .clone_repo(&self.descriptor.url, &self.descriptor.branch, &self.path)
            .await
            .map_err(SupervisorError::Clone)?;
        self.emit(LogLevel::Info, "Clone complete");
        self.repo_ready = true;
        self.next_update_check = Instant::now() + self.config.git_check_interval;
        Ok(())
    }

    /// Fetch and compare when the update check is due.
    async fn update_available(&mut self) -> bool {
        let now = Instant::now();
        if now < self.next_update_check {
            return false;
        }
        self.next_update_check = now + self.config.git_check_interval;

        if let Err(e) = self.deps.git.fetch(&self.path).await {
            self.emit(LogLevel::Warning, format!("Failed to check for updates: {e}"));
            return false;
        }
        match self.deps.git.is_ahead(&self.path, &self.descriptor.branch).await {
            Ok(ahead) => ahead,
            Err(e) => {
                self.emit(LogLevel::Warning, format!("Failed to compare with remote: {e}"));
                false
            }
        }
    }

    /// Terminate, pull. The caller relaunches, from the old checkout if the
    /// pull failed.
    async fn update(&mut self) {
        self.record.status = ServiceStatus::Updating;
        self.emit(
            LogLevel::Info,
            format!("New updates found on branch {}. Restarting script...", self.descriptor.branch),
        );
        self.publish();

        self.terminate_child().await;
        self.record.script_pid = None;
        self.publish();

        match self.deps.git.pull(&self.path, &self.descriptor.branch).await {
            Ok(()) => self.emit(LogLevel::Info, "Pulled latest changes"),
            Err(e) => {
                // The next attempt waits for the regular update check.
                self.emit(LogLevel::Error, SupervisorError::Pull(e).to_string());
                self.record.without_child(ServiceStatus::Failed);
                self.publish();
                self.emit(LogLevel::Warning, "Restarting script from the current checkout");
            }
        }
    }

    async fn launch(&mut self) -> Result<(), SupervisorError> {
        let script = discover_script(&self.path, &self.config.script_file).await?;
        self.record.script_to_run = Some(script.clone());

        let spec = LaunchSpec::new(self.config.interpreter.clone(), self.path.clone()).arg(&script);
        self.emit(LogLevel::Info, format!("Starting script: {spec}"));
        let child = self.deps.launcher.spawn(&spec).await.map_err(SupervisorError::Launch)?;
        let pid = child.pid();
        self.child = Some(child);
        self.record.running(script, pid);
        match pid {
            Some(pid) => self.emit(LogLevel::Info, format!("Script started with PID {pid}")),
            None => self.emit(LogLevel::Info, "Script started"),
        }
        self.publish();
        Ok(())
    }

    async fn fail(&mut self, error: SupervisorError) {
        self.emit(LogLevel::Error, error.to_string());
        self.terminate_child().await;
        self.record.without_child(ServiceStatus::Failed);
    }

    /// Pick up a url/branch change sent by the reconciler.
    async fn apply_reconfiguration(&mut self) {
        let latest = self.updates.borrow_and_update().clone();
        if latest.same_source(&self.descriptor) {
            return;
        }
        let previous = std::mem::replace(&mut self.descriptor, latest);
        self.record.url = self.descriptor.url.clone();
        self.record.branch = self.descriptor.branch.clone();
        self.emit(
            LogLevel::Info,
            format!(
                "Reconfigured: {} ({}) -> {} ({})",
                previous.url, previous.branch, self.descriptor.url, self.descriptor.branch
            ),
        );

        if self.repo_ready && previous.url != self.descriptor.url {
            if let Err(e) = self.deps.git.set_remote_url(&self.path, &self.descriptor.url).await {
                self.emit(LogLevel::Warning, format!("Failed to update remote url: {e}"));
            }
        }
        self.next_update_check = Instant::now();
        self.publish();
    }

    async fn terminate_child(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        self.emit(LogLevel::Info, "Terminating running script...");
        if let Err(e) = child.terminate(self.config.stop_grace).await {
            self.emit(LogLevel::Warning, format!("Failed to terminate script: {e}"));
        }
    }

    async fn shutdown(&mut self) {
        if self.child.is_some() {
            info!(service = %self.path.display(), "stopping supervisor");
            self.terminate_child().await;
        }
    }

    /// Log to tracing and to the record's ring.
    fn emit(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        let service = self.path.display();
        match level {
            LogLevel::Info => info!(service = %service, "{message}"),
            LogLevel::Warning => warn!(service = %service, "{message}"),
            LogLevel::Error => error!(service = %service, "{message}"),
        }
        self.record.log(self.deps.clock.as_ref(), level, message);
    }

    fn publish(&self) {
        self.deps.store.set(self.path.clone(), self.record.clone());
    }
}
