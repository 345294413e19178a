// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: configuration, startup, shutdown.

mod logging;
mod startup;

pub use logging::init_logging;
pub use startup::run;

use std::path::PathBuf;
use std::time::Duration;

use ax_adapters::GitError;
use thiserror::Error;

use crate::env;
use crate::supervisor::SupervisorConfig;

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Services file re-read every `main_loop_interval`
    pub services_file: PathBuf,
    /// Absolute root under which every working copy lives
    pub repos_dir: PathBuf,
    pub main_loop_interval: Duration,
    pub supervisor: SupervisorConfig,
    /// Status API; `None` when disabled
    pub api: Option<ApiConfig>,
    /// Directory for daily rolling log files; stdout when unset
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from `AUTOEXEC_*` environment variables.
    ///
    /// A relative repos directory is resolved against the current directory
    /// so service paths are stable however they are later used.
    pub fn load() -> Result<Self, LifecycleError> {
        let defaults = SupervisorConfig::default();
        let supervisor = SupervisorConfig {
            health_check_interval: env::health_check_interval(),
            git_check_interval: env::git_check_interval(),
            failure_backoff: env::failure_backoff(),
            stop_grace: env::stop_grace(),
            max_log_entries: env::max_log_entries().unwrap_or(defaults.max_log_entries),
            interpreter: env::interpreter().unwrap_or(defaults.interpreter),
            script_file: env::script_file().unwrap_or(defaults.script_file),
        };

        let repos_dir = env::repos_dir();
        let repos_dir = if repos_dir.is_absolute() {
            repos_dir
        } else {
            std::env::current_dir().map_err(LifecycleError::CurrentDir)?.join(repos_dir)
        };

        let api = env::api_enabled().then(|| ApiConfig { host: env::api_host(), port: env::api_port() });

        Ok(Self {
            services_file: env::services_file(),
            repos_dir,
            main_loop_interval: env::main_loop_interval(),
            supervisor,
            api,
            log_dir: env::log_dir(),
        })
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("git is not available: {0}")]
    GitUnavailable(#[source] GitError),

    #[error("failed to resolve current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    #[error("failed to create repos directory {path}: {source}")]
    ReposDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
