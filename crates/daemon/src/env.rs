// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.
//!
//! Unset, empty or unparsable values fall back to the default.

use std::path::PathBuf;
use std::time::Duration;

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Positive millisecond duration from `name`
fn millis(name: &str) -> Option<Duration> {
    var(name).and_then(|s| s.parse::<u64>().ok()).filter(|ms| *ms > 0).map(Duration::from_millis)
}

/// Services file (`AUTOEXEC_SERVICES_FILE`, default `services.txt`)
pub fn services_file() -> PathBuf {
    var("AUTOEXEC_SERVICES_FILE").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("services.txt"))
}

/// Root for working copies (`AUTOEXEC_REPOS_DIR`, default `repos`)
pub fn repos_dir() -> PathBuf {
    var("AUTOEXEC_REPOS_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("repos"))
}

/// How often the services file is re-read
pub fn main_loop_interval() -> Duration {
    millis("AUTOEXEC_MAIN_LOOP_MS").unwrap_or(Duration::from_secs(5))
}

pub fn git_check_interval() -> Duration {
    millis("AUTOEXEC_GIT_CHECK_MS").unwrap_or(Duration::from_secs(30))
}

pub fn health_check_interval() -> Duration {
    millis("AUTOEXEC_HEALTH_CHECK_MS").unwrap_or(Duration::from_secs(5))
}

pub fn failure_backoff() -> Duration {
    millis("AUTOEXEC_FAILURE_BACKOFF_MS").unwrap_or(Duration::from_secs(5))
}

/// Time a child gets between SIGTERM and SIGKILL
pub fn stop_grace() -> Duration {
    millis("AUTOEXEC_STOP_GRACE_MS").unwrap_or(Duration::from_secs(5))
}

pub fn max_log_entries() -> Option<usize> {
    var("AUTOEXEC_MAX_LOG_ENTRIES").and_then(|s| s.parse::<usize>().ok())
}

pub fn interpreter() -> Option<String> {
    var("AUTOEXEC_INTERPRETER")
}

pub fn script_file() -> Option<String> {
    var("AUTOEXEC_SCRIPT_FILE")
}

/// Status API switch (`AUTOEXEC_API_ENABLED`). `0`, `false`, `no` and `off`
/// disable it; anything else, or unset, leaves it on.
pub fn api_enabled() -> bool {
    match var("AUTOEXEC_API_ENABLED") {
        Some(v) => !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"),
        None => true,
    }
}

pub fn api_host() -> String {
    var("AUTOEXEC_API_HOST").unwrap_or_else(|| "localhost".to_string())
}

pub fn api_port() -> u16 {
    var("AUTOEXEC_API_PORT").and_then(|s| s.parse::<u16>().ok()).unwrap_or(8000)
}

/// Directory for daily log files. Unset logs to stdout.
pub fn log_dir() -> Option<PathBuf> {
    var("AUTOEXEC_LOG_DIR").map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
