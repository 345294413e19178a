// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parser for the services file.
//!
//! Each non-blank line that does not start with `#` declares one service:
//!
//! ```text
//! # url                                  [branch]  [directory]
//! https://github.com/acme/worker.git
//! https://github.com/acme/api.git        release
//! git@github.com:acme/api.git            main      api-canary
//! ```

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::service::{is_plain_directory_name, repo_name_from_url, ServiceDescriptor, DEFAULT_BRANCH};

/// Errors reading the services file as a whole.
#[derive(Debug, Error)]
pub enum ServicesFileError {
    #[error("services file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read services file {0}: {1}")]
    Read(PathBuf, #[source] io::Error),
}

/// A single line that could not be turned into a service (the rest of the
/// file is still used).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("line {line}: invalid directory name '{name}'")]
    InvalidDirectory { line: usize, name: String },
}

/// Non-fatal observation about a line that was still accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineWarning {
    pub line: usize,
    pub ignored: Vec<String>,
}

/// Parsed contents of a services file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicesFile {
    /// Accepted services, in file order
    pub services: Vec<ServiceDescriptor>,
    /// Lines rejected outright
    pub errors: Vec<LineError>,
    /// Lines accepted with trailing fields ignored
    pub warnings: Vec<LineWarning>,
}

/// Parse services-file text.
pub fn parse(text: &str) -> ServicesFile {
    let mut parsed = ServicesFile::default();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let Some(url) = fields.next() else { continue };
        let branch = fields.next().unwrap_or(DEFAULT_BRANCH);
        let directory_name = match fields.next() {
            Some(name) => name.to_string(),
            None => repo_name_from_url(url),
        };

        let ignored: Vec<String> = fields.map(str::to_string).collect();
        if !ignored.is_empty() {
            parsed.warnings.push(LineWarning { line: line_no, ignored });
        }

        if !is_plain_directory_name(&directory_name) {
            parsed
                .errors
                .push(LineError::InvalidDirectory { line: line_no, name: directory_name });
            continue;
        }

        parsed.services.push(ServiceDescriptor {
            url: url.to_string(),
            branch: branch.to_string(),
            directory_name,
        });
    }

    parsed
}

/// Read and parse the services file at `path`.
///
/// A missing file is reported separately from other read failures so the
/// caller can choose different policies for each.
pub fn load(path: &Path) -> Result<ServicesFile, ServicesFileError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse(&text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(ServicesFileError::NotFound(path.to_path_buf()))
        }
        Err(e) => Err(ServicesFileError::Read(path.to_path_buf(), e)),
    }
}

#[cfg(test)]
#[path = "services_file_tests.rs"]
mod tests;
