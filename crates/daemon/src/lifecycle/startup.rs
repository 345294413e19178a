// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use ax_adapters::{CliGitAdapter, GitAdapter, OsLauncher};
use ax_core::{StatusStore, SystemClock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{Config, LifecycleError};
use crate::reconciler::Reconciler;
use crate::server::StatusServer;
use crate::supervisor::SupervisorDeps;

/// Run the daemon until `shutdown` fires.
///
/// Fails before managing anything if git is missing or the repos directory
/// cannot be created. A status server that cannot bind is logged and the
/// daemon carries on without it.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), LifecycleError> {
    let manager_pid = std::process::id();
    info!(pid = manager_pid, "AutoExec supervisor starting");

    let git = CliGitAdapter::new();
    let version = git.version().await.map_err(LifecycleError::GitUnavailable)?;
    info!(%version, "git found");

    std::fs::create_dir_all(&config.repos_dir).map_err(|source| LifecycleError::ReposDir {
        path: config.repos_dir.clone(),
        source,
    })?;
    info!(
        repos_dir = %config.repos_dir.display(),
        services_file = %config.services_file.display(),
        "managing services"
    );

    let store = StatusStore::new();

    let server_task = match &config.api {
        Some(api) => match StatusServer::bind(&api.host, api.port, store.clone(), manager_pid) {
            Ok(server) => Some(tokio::spawn(server.run(shutdown.clone()))),
            Err(e) => {
                error!(error = %e, "status server unavailable, continuing without it");
                None
            }
        },
        None => {
            info!("status server disabled");
            None
        }
    };

    let deps = SupervisorDeps {
        git: Arc::new(git),
        launcher: Arc::new(OsLauncher),
        clock: Arc::new(SystemClock),
        store,
        manager_pid,
    };
    let reconciler = Reconciler::new(config.repos_dir.clone(), config.supervisor.clone(), deps);
    reconciler.run(config.services_file.clone(), config.main_loop_interval, shutdown.clone()).await;

    if let Some(task) = server_task {
        if let Err(e) = task.await {
            error!(error = %e, "status server task failed");
        }
    }
    info!("AutoExec supervisor stopped");
    Ok(())
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
