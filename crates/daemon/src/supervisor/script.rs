// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Script discovery: which file a repository wants run.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("'{0}' not found. Cannot start script.")]
    Missing(String),

    #[error("failed to read '{file}': {source}")]
    Read {
        file: String,
        #[source]
        source: io::Error,
    },

    #[error("'{0}' does not name a script")]
    Empty(String),

    #[error("script '{0}' must be a relative path inside the repository")]
    OutsideRepo(String),

    #[error("script '{0}' not found in repository")]
    NotFound(String),
}

/// Read `script_file` at the root of `repo` and return the script it names.
///
/// The first non-empty line, trimmed, must be a relative path to an
/// existing file that stays inside the repository.
pub async fn discover_script(repo: &Path, script_file: &str) -> Result<String, ScriptError> {
    let text = match tokio::fs::read_to_string(repo.join(script_file)).await {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ScriptError::Missing(script_file.to_string()))
        }
        Err(source) => return Err(ScriptError::Read { file: script_file.to_string(), source }),
    };

    let Some(script) = text.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return Err(ScriptError::Empty(script_file.to_string()));
    };

    let relative = PathBuf::from(script);
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !contained {
        return Err(ScriptError::OutsideRepo(script.to_string()));
    }

    match tokio::fs::metadata(repo.join(&relative)).await {
        Ok(meta) if meta.is_file() => Ok(script.to_string()),
        _ => Err(ScriptError::NotFound(script.to_string())),
    }
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
