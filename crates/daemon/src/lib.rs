// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AutoExec daemon library
//!
//! Keeps declared Git-hosted services cloned, current and running, and
//! serves their status over HTTP.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod lifecycle;
pub mod reconciler;
pub mod server;
pub mod supervisor;

#[cfg(test)]
mod test_support;

pub use lifecycle::{ApiConfig, Config, LifecycleError};
pub use reconciler::{Reconciler, TickSummary};
pub use server::{ServerError, StatusServer};
pub use supervisor::{SupervisorConfig, SupervisorDeps, SupervisorError, SupervisorHandle};
