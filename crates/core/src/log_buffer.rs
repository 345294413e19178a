// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded per-service log ring.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Local};
use serde::ser::{Serialize, SerializeSeq, Serializer};

/// Log retention per service when nothing else is configured.
pub const DEFAULT_MAX_LOG_ENTRIES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub epoch_ms: u64,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    /// `[2026-01-01 12:00:00] [INFO] message`, in local time.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::from_timestamp_millis(self.epoch_ms as i64) {
            Some(utc) => {
                let local = utc.with_timezone(&Local);
                write!(f, "[{}] [{}] {}", local.format("%Y-%m-%d %H:%M:%S"), self.level, self.message)
            }
            None => write!(f, "[{}] [{}] {}", self.epoch_ms, self.level, self.message),
        }
    }
}

/// FIFO ring holding at most `capacity` entries; the oldest entry is
/// evicted first. Serializes as a list of rendered lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBuffer {
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: VecDeque::with_capacity(capacity) }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries oldest first
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Rendered lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_ENTRIES)
    }
}

impl Serialize for LogBuffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for entry in &self.entries {
            seq.serialize_element(&entry.to_string())?;
        }
        seq.end()
    }
}

#[cfg(test)]
#[path = "log_buffer_tests.rs"]
mod tests;
