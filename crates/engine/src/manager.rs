// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task manager: an ordered pending list with priority classes, a
//! single serial worker, a parallel lane for `immediate` submissions, and
//! per-identity deduplication against the pending list only.

use crate::task::Task;
use parking_lot::Mutex;
use snapd_core::Priority;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Outcome of a `submit` call, mirroring what the caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Appended to the pending list.
    Queued,
    /// Dropped: an identical identity was already pending.
    Deduplicated,
    /// Spawned on the parallel immediate lane.
    RanImmediately,
}

struct Inner {
    pending: Mutex<VecDeque<Arc<Task>>>,
    running: Mutex<HashMap<String, AbortHandle>>,
    doorbell: Notify,
    cancel: CancellationToken,
}

/// Coordinates submission and execution of [`Task`]s.
pub struct TaskManager {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(VecDeque::new()),
                running: Mutex::new(HashMap::new()),
                doorbell: Notify::new(),
                cancel: CancellationToken::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Starts the single worker loop. Idempotent: a second call is a no-op.
    pub fn start(&self) {
        if self.worker.lock().is_some() {
            return;
        }
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move { worker_loop(inner).await });
        *self.worker.lock() = Some(handle);
    }

    /// Submits `task` under the given priority.
    ///
    /// `dedupe` drops the submission if a task with the same identity is
    /// already in the pending list (the running set is not considered, so
    /// identical work can be re-enqueued once the previous run starts).
    pub fn submit(&self, task: Arc<Task>, priority: Priority, dedupe: bool) -> SubmitOutcome {
        if dedupe && self.inner.pending.lock().iter().any(|t| t.id() == task.id()) {
            return SubmitOutcome::Deduplicated;
        }

        match priority {
            Priority::Normal => {
                self.inner.pending.lock().push_back(task);
            }
            Priority::Next => {
                let mut pending = self.inner.pending.lock();
                let insert_at = pending.iter().position(|t| t.priority() == Priority::Normal).unwrap_or(pending.len());
                pending.insert(insert_at, task);
            }
            Priority::Immediate => {
                let mut pending = self.inner.pending.lock();
                if pending.is_empty() {
                    pending.push_back(task);
                } else {
                    drop(pending);
                    self.run_parallel(task);
                    return SubmitOutcome::RanImmediately;
                }
            }
        }

        self.inner.doorbell.notify_one();
        SubmitOutcome::Queued
    }

    /// Spawns `task` on its own runner, outside the single-worker lane.
    fn run_parallel(&self, task: Arc<Task>) {
        let id = task.id().to_string();
        let inner = self.inner.clone();
        let handle = tokio::spawn({
            let task = task.clone();
            let id = id.clone();
            async move {
                task.run().await;
                inner.running.lock().remove(&id);
            }
        });
        self.inner.running.lock().insert(id, handle.abort_handle());
    }

    /// Aborts every currently running task in parallel, then waits for the
    /// worker loop to notice the cancellation and exit. Already-queued-
    /// but-not-started tasks are left untouched.
    ///
    /// The abort must happen before awaiting the worker: the worker is
    /// itself blocked awaiting the in-flight task's join handle, with no
    /// cancellation-aware select around that wait, so aborting first is
    /// what unblocks it.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        self.inner.doorbell.notify_one();

        let handles: Vec<AbortHandle> = self.inner.running.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.abort();
        }

        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.await;
        }
    }

    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn running_len(&self) -> usize {
        self.inner.running.lock().len()
    }
}

async fn worker_loop(inner: Arc<Inner>) {
    loop {
        let next = inner.pending.lock().pop_front();
        let task = match next {
            Some(task) => task,
            None => {
                tokio::select! {
                    _ = inner.cancel.cancelled() => return,
                    _ = inner.doorbell.notified() => continue,
                }
            }
        };

        if inner.cancel.is_cancelled() {
            return;
        }

        let id = task.id().to_string();
        let handle = tokio::spawn({
            let task = task.clone();
            async move {
                task.run().await;
            }
        });
        inner.running.lock().insert(id.clone(), handle.abort_handle());

        let result = handle.await;
        inner.running.lock().remove(&id);

        if let Err(err) = result {
            if !err.is_cancelled() {
                warn!(component = "task_manager", action = "run", status = "failure", task = %id, "unexpected panic running task");
            }
        }

        if inner.cancel.is_cancelled() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn three_normal_tasks_run_in_submission_order() {
        let manager = TaskManager::new();
        manager.start();
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["a", "b", "c"] {
            let order = order.clone();
            let task = Task::new(name, Priority::Normal, async move {
                order.lock().push(name.to_string());
                Ok(())
            });
            manager.submit(task, Priority::Normal, true);
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
        manager.stop().await;
    }

    #[tokio::test]
    async fn next_priority_preempts_later_normal_submissions() {
        let manager = TaskManager::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        // Occupy the worker with a long-running normal task first so later
        // submissions queue up without racing the worker.
        let blocker = Task::new("blocker", Priority::Normal, async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Ok(())
        });
        manager.submit(blocker, Priority::Normal, true);
        manager.start();
        tokio::time::sleep(Duration::from_millis(5)).await;

        for (name, prio) in [("normal-c", Priority::Normal), ("next-b", Priority::Next)] {
            let order = order.clone();
            let task = Task::new(name, prio, async move {
                order.lock().push(name.to_string());
                Ok(())
            });
            manager.submit(task, prio, true);
        }

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(*order.lock(), vec!["next-b", "normal-c"]);
        manager.stop().await;
    }

    #[tokio::test]
    async fn immediate_runs_in_parallel_when_queue_is_busy() {
        let manager = TaskManager::new();
        let immediate_ran = Arc::new(AtomicUsize::new(0));

        let blocker = Task::new("blocker", Priority::Normal, async {
            tokio::time::sleep(Duration::from_millis(60)).await;
            Ok(())
        });
        manager.submit(blocker, Priority::Normal, true);
        manager.start();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let also_queued = Task::new("also-queued", Priority::Normal, async { Ok(()) });
        manager.submit(also_queued, Priority::Normal, true);

        let flag = immediate_ran.clone();
        let immediate = Task::new("immediate-x", Priority::Immediate, async move {
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let outcome = manager.submit(immediate, Priority::Immediate, true);
        assert_eq!(outcome, SubmitOutcome::RanImmediately);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(immediate_ran.load(Ordering::SeqCst), 1);

        manager.stop().await;
    }

    #[tokio::test]
    async fn duplicate_identity_is_dropped_while_pending() {
        let manager = TaskManager::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let blocker = Task::new("blocker", Priority::Normal, async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Ok(())
        });
        manager.submit(blocker, Priority::Normal, true);
        manager.start();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let flag = runs.clone();
        let first = Task::new("backup_x", Priority::Normal, async move {
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let outcome1 = manager.submit(first, Priority::Normal, true);
        assert_eq!(outcome1, SubmitOutcome::Queued);

        let flag2 = runs.clone();
        let second = Task::new("backup_x", Priority::Normal, async move {
            flag2.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let outcome2 = manager.submit(second, Priority::Normal, true);
        assert_eq!(outcome2, SubmitOutcome::Deduplicated);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        manager.stop().await;
    }

    #[tokio::test]
    async fn stop_aborts_running_tasks() {
        let manager = TaskManager::new();
        let completed = Arc::new(AtomicUsize::new(0));

        let flag = completed.clone();
        let task = Task::new("long", Priority::Normal, async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        manager.submit(task, Priority::Normal, true);
        manager.start();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(manager.running_len(), 1);
        manager.stop().await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_task_does_not_stall_the_worker() {
        let manager = TaskManager::new();
        manager.start();

        let failing = Task::new("fail", Priority::Normal, async { Err(TaskError::new("boom")) });
        manager.submit(failing, Priority::Normal, true);

        let ok = Task::new("ok", Priority::Normal, async { Ok(()) });
        let ok_clone = ok.clone();
        manager.submit(ok, Priority::Normal, true);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(ok_clone.is_ended());
        manager.stop().await;
    }
}
