// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the supervisor's external collaborators.

pub mod git;
pub mod process;
pub mod subprocess;

pub use git::{CliGitAdapter, GitAdapter, GitError};
pub use process::{LaunchSpec, OsLauncher, ProcessError, ProcessLauncher, RunningProcess};
pub use subprocess::SubprocessError;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use git::{FakeGitAdapter, GitCall};
#[cfg(any(test, feature = "test-support"))]
pub use process::{FakeLauncher, FakeProcessInfo};
