// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! snapd-adapters: the Engine Invoker (C1) — spawns the external snapshot
//! engine (`restic`), streams its output to the logger, and tracks every
//! live subprocess in a process-wide registry so the Lifecycle component
//! (C9) can broadcast SIGINT on shutdown.

mod registry;
mod restic;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use registry::ProcessRegistry;
pub use restic::ResticInvoker;

use async_trait::async_trait;
use snapd_core::{EngineError, TraceNode};
use std::collections::BTreeMap;

/// A single invocation of the snapshot engine.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub cmd: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub json_out: bool,
    pub trace: TraceNode,
}

impl InvokeRequest {
    pub fn new(cmd: impl Into<String>, trace: TraceNode) -> Self {
        Self { cmd: cmd.into(), args: Vec::new(), env: BTreeMap::new(), json_out: false, trace }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_out = true;
        self
    }
}

/// The collected outcome of a successful invocation.
#[derive(Debug, Clone)]
pub struct InvokeOutcome {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Parsed stdout, present iff `InvokeRequest::json_out` was set.
    pub json: Option<serde_json::Value>,
}

/// Contract: `invoke(cmd, args, env, jsonOut?, traceNode?) -> {code, stdout, stderr}`.
#[async_trait]
pub trait EngineInvoker: Send + Sync {
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeOutcome, EngineError>;
}
