// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake launcher whose children are flags that tests can flip.

use super::{LaunchSpec, ProcessError, ProcessLauncher, RunningProcess};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Everything recorded about one fake child
#[derive(Debug, Clone)]
pub struct FakeProcessInfo {
    pub pid: u32,
    pub spec: LaunchSpec,
    alive: Arc<AtomicBool>,
    terminated: Arc<AtomicBool>,
}

impl FakeProcessInfo {
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Whether the supervisor stopped it (as opposed to a crash)
    pub fn was_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

struct FakeLauncherState {
    next_pid: u32,
    spawned: Vec<FakeProcessInfo>,
    spawn_failures: usize,
}

/// Fake [`ProcessLauncher`]
#[derive(Clone)]
pub struct FakeLauncher {
    inner: Arc<Mutex<FakeLauncherState>>,
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeLauncherState {
                next_pid: 1000,
                spawned: Vec::new(),
                spawn_failures: 0,
            })),
        }
    }
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_spawns(&self, count: usize) {
        self.inner.lock().spawn_failures = count;
    }

    /// Every child ever spawned, oldest first
    pub fn spawned(&self) -> Vec<FakeProcessInfo> {
        self.inner.lock().spawned.clone()
    }

    pub fn get(&self, pid: u32) -> Option<FakeProcessInfo> {
        self.inner.lock().spawned.iter().find(|p| p.pid == pid).cloned()
    }

    pub fn alive(&self) -> Vec<FakeProcessInfo> {
        self.spawned().into_iter().filter(FakeProcessInfo::is_alive).collect()
    }

    /// Make the child with `pid` exit on its own. Returns false if it was
    /// not running.
    pub fn crash(&self, pid: u32) -> bool {
        match self.get(pid) {
            Some(info) => info.alive.swap(false, Ordering::SeqCst),
            None => false,
        }
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<Box<dyn RunningProcess>, ProcessError> {
        let mut state = self.inner.lock();
        if state.spawn_failures > 0 {
            state.spawn_failures -= 1;
            return Err(ProcessError::Spawn {
                program: spec.program.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "injected failure"),
            });
        }
        let pid = state.next_pid;
        state.next_pid += 1;
        let info = FakeProcessInfo {
            pid,
            spec: spec.clone(),
            alive: Arc::new(AtomicBool::new(true)),
            terminated: Arc::new(AtomicBool::new(false)),
        };
        state.spawned.push(info.clone());
        Ok(Box::new(FakeProcess { info, exited: false }))
    }
}

struct FakeProcess {
    info: FakeProcessInfo,
    exited: bool,
}

#[async_trait]
impl RunningProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        (!self.exited).then_some(self.info.pid)
    }

    fn is_alive(&mut self) -> bool {
        if !self.info.is_alive() {
            self.exited = true;
        }
        !self.exited
    }

    fn exit_summary(&self) -> Option<String> {
        self.exited.then(|| "exit status: 1".to_string())
    }

    async fn terminate(&mut self, _grace: Duration) -> Result<(), ProcessError> {
        if self.info.alive.swap(false, Ordering::SeqCst) {
            self.info.terminated.store(true, Ordering::SeqCst);
        }
        self.exited = true;
        Ok(())
    }
}

// Mirrors `kill_on_drop`: a child whose handle is dropped does not outlive it.
impl Drop for FakeProcess {
    fn drop(&mut self) {
        self.info.alive.store(false, Ordering::SeqCst);
    }
}
