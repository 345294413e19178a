// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declared services and their identity on disk.

use std::path::{Component, Path, PathBuf};

/// Branch tracked when a services-file line names none.
pub const DEFAULT_BRANCH: &str = "main";

/// Directory name used when nothing usable can be derived from a URL.
pub const UNKNOWN_REPO: &str = "unknown_repo";

/// One declared service: a Git remote, the branch to track and the
/// directory (under the repos root) its working copy lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub url: String,
    pub branch: String,
    pub directory_name: String,
}

impl ServiceDescriptor {
    /// Descriptor tracking [`DEFAULT_BRANCH`] in the directory derived from `url`.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let directory_name = repo_name_from_url(&url);
        Self { url, branch: DEFAULT_BRANCH.to_string(), directory_name }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_directory_name(mut self, directory_name: impl Into<String>) -> Self {
        self.directory_name = directory_name.into();
        self
    }

    /// The service's identity: `repos_dir/directory_name`.
    pub fn resolve(&self, repos_dir: &Path) -> PathBuf {
        repos_dir.join(&self.directory_name)
    }

    /// True when `other` points at the same remote and branch.
    ///
    /// Directory names are not compared; callers only ask this of
    /// descriptors that already resolve to the same path.
    pub fn same_source(&self, other: &ServiceDescriptor) -> bool {
        self.url == other.url && self.branch == other.branch
    }
}

/// Derive a directory name from the last path segment of a Git URL.
///
/// Handles `https://host/owner/repo.git`, `ssh://...`, scp-style
/// `git@host:owner/repo.git` and local paths. A trailing `/` and a single
/// `.git` suffix are stripped.
pub fn repo_name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let trimmed = without_query.trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next().unwrap_or_default();
    let name = last.strip_suffix(".git").unwrap_or(last);
    if is_plain_directory_name(name) {
        name.to_string()
    } else {
        UNKNOWN_REPO.to_string()
    }
}

/// True when `name` is exactly one normal path component.
///
/// Rejects empty names, `.`/`..`, and anything containing a separator, so
/// a resolved path can never escape the repos root.
pub fn is_plain_directory_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == name
    )
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
