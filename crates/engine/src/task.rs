// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single unit of work: identity, priority, state machine, ended-signal.

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use snapd_core::Priority;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TaskError(pub String);

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    New,
    Running,
    Success,
    Failure,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failure => "failure",
        };
        write!(f, "{s}")
    }
}

/// A task body and its outcome. `run` consumes the body, so a task can be
/// started at most once: a second `run` call is a silent no-op.
pub struct Task {
    id: String,
    priority: Priority,
    state: Mutex<TaskState>,
    ended: Notify,
    body: Mutex<Option<BoxFuture<'static, Result<(), TaskError>>>>,
    error: Mutex<Option<TaskError>>,
}

impl Task {
    pub fn new<F>(id: impl Into<String>, priority: Priority, body: F) -> Arc<Self>
    where
        F: std::future::Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Arc::new(Self {
            id: id.into(),
            priority,
            state: Mutex::new(TaskState::New),
            ended: Notify::new(),
            body: Mutex::new(Some(Box::pin(body))),
            error: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.state(), TaskState::Success | TaskState::Failure)
    }

    /// Runs the task body to completion. Invoking this more than once is a
    /// no-op after the first call takes the body.
    pub async fn run(self: &Arc<Self>) {
        let body = self.body.lock().take();
        let Some(body) = body else {
            return;
        };

        *self.state.lock() = TaskState::Running;
        let outcome = body.await;
        match outcome {
            Ok(()) => *self.state.lock() = TaskState::Success,
            Err(err) => {
                *self.error.lock() = Some(err);
                *self.state.lock() = TaskState::Failure;
            }
        }
        self.ended.notify_waiters();
    }

    /// Waits until the task has reached a terminal state.
    pub async fn wait_until_ended(&self) {
        loop {
            let notified = self.ended.notified();
            if self.is_ended() {
                return;
            }
            notified.await;
        }
    }

    /// Waits for completion and returns the task's outcome.
    pub async fn result(&self) -> Result<(), TaskError> {
        self.wait_until_ended().await;
        match self.state() {
            TaskState::Success => Ok(()),
            TaskState::Failure => {
                Err(self.error.lock().clone().unwrap_or_else(|| TaskError::new("task failed")))
            }
            TaskState::New | TaskState::Running => {
                unreachable!("wait_until_ended only returns once a task is terminal")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_transitions_new_to_success() {
        let task = Task::new("t1", Priority::Normal, async { Ok(()) });
        assert_eq!(task.state(), TaskState::New);
        task.run().await;
        assert_eq!(task.state(), TaskState::Success);
        assert!(task.is_ended());
        assert!(task.result().await.is_ok());
    }

    #[tokio::test]
    async fn failed_body_yields_failure_state_and_error() {
        let task = Task::new("t2", Priority::Normal, async { Err(TaskError::new("boom")) });
        task.run().await;
        assert_eq!(task.state(), TaskState::Failure);
        let err = task.result().await.unwrap_err();
        assert_eq!(err.0, "boom");
    }

    #[tokio::test]
    async fn second_run_is_a_noop() {
        let task = Task::new("t3", Priority::Normal, async { Ok(()) });
        task.run().await;
        task.run().await;
        assert_eq!(task.state(), TaskState::Success);
    }

    #[tokio::test]
    async fn wait_until_ended_unblocks_concurrent_waiters() {
        let task = Task::new("t4", Priority::Normal, async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(())
        });
        let waiter_task = task.clone();
        let waiter = tokio::spawn(async move {
            waiter_task.wait_until_ended().await;
        });
        task.run().await;
        waiter.await.unwrap();
    }
}
