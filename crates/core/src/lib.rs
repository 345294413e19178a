// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ax-core: shared types for the AutoExec supervisor

pub mod clock;
pub mod log_buffer;
pub mod service;
pub mod services_file;
pub mod status;
pub mod store;

pub use clock::{Clock, FakeClock, SystemClock};
pub use log_buffer::{LogBuffer, LogEntry, LogLevel, DEFAULT_MAX_LOG_ENTRIES};
pub use service::{repo_name_from_url, ServiceDescriptor, DEFAULT_BRANCH};
pub use services_file::{LineError, LineWarning, ServicesFile, ServicesFileError};
pub use status::{ServiceStatus, StatusRecord};
pub use store::StatusStore;
