// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use super::LifecycleError;

const LOG_FILE_PREFIX: &str = "autoexecd.log";

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
///
/// Logs go to stdout, or to a daily rolling file under `log_dir`. The
/// returned guard flushes buffered lines when dropped and must be held for
/// the life of the process.
pub fn init_logging(log_dir: Option<&Path>) -> Result<WorkerGuard, LifecycleError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (writer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|source| LifecycleError::LogDir { path: dir.to_path_buf(), source })?;
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX))
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    // A subscriber installed earlier (tests) wins.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_dir.is_none())
        .try_init();
    Ok(guard)
}
