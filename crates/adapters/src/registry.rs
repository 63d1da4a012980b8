// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide live-process registry, owned by the Lifecycle component and
//! injected into the Engine Invoker, rather than module-level mutable
//! statics the way the Python prototype kept its `processes` list.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Tracks currently running snapshot-engine subprocesses by pid.
#[derive(Clone, Default)]
pub struct ProcessRegistry {
    pids: Arc<Mutex<HashMap<u32, ()>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a spawned process. Must be paired with exactly one
    /// `deregister` regardless of the process's outcome.
    pub fn register(&self, pid: u32) {
        self.pids.lock().insert(pid, ());
    }

    pub fn deregister(&self, pid: u32) {
        self.pids.lock().remove(&pid);
    }

    pub fn len(&self) -> usize {
        self.pids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sends SIGINT to every live process. Best effort: a pid that has
    /// already exited is silently skipped.
    pub fn broadcast_sigint(&self) {
        let pids: Vec<u32> = self.pids.lock().keys().copied().collect();
        for pid in pids {
            let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT);
        }
    }
}
