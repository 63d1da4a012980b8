// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fake invoker for daemon/engine tests that don't want to spawn
//! a real `restic` binary.

use crate::{EngineInvoker, InvokeOutcome, InvokeRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use snapd_core::EngineError;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct FakeInvoker {
    calls: Arc<Mutex<Vec<InvokeRequest>>>,
    responses: Arc<Mutex<VecDeque<Result<InvokeOutcome, EngineError>>>>,
}

impl FakeInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the next response, FIFO. If the queue is empty, `invoke`
    /// returns a bare success with empty output.
    pub fn push_response(&self, response: Result<InvokeOutcome, EngineError>) {
        self.responses.lock().push_back(response);
    }

    pub fn calls(&self) -> Vec<InvokeRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl EngineInvoker for FakeInvoker {
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeOutcome, EngineError> {
        self.calls.lock().push(request);
        let queued = self.responses.lock().pop_front();
        match queued {
            Some(result) => result,
            None => Ok(InvokeOutcome { code: 0, stdout: String::new(), stderr: String::new(), json: None }),
        }
    }
}
