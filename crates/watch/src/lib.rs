// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! snapd-watch: the FS Watch Coalescer (C3) — debounces bursts of
//! filesystem events under a set of watched paths and fires a callback
//! once per burst, no earlier than is useful and no later than is safe.

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use snapd_matcher::PathMatcher;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("failed to start filesystem watcher: {0}")]
    Start(String),
    #[error("failed to watch path {path}: {source}")]
    Watch { path: PathBuf, source: String },
}

/// A raw, not-yet-filtered filesystem change. `dest` is set for rename
/// events, mirroring `notify`'s `Event::paths` pairing.
struct RawEvent {
    src: PathBuf,
    dest: Option<PathBuf>,
}

/// Handle returned by [`watch`]. Dropping it does not stop the watcher;
/// call [`WatchHandle::stop`] explicitly.
pub struct WatchHandle {
    cancel: CancellationToken,
    watcher: RecommendedWatcher,
    task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    /// Stops the watcher and the debounce loop, and waits for the loop
    /// task to finish. Idempotent.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
        drop(self.watcher);
    }
}

/// Starts watching `paths` recursively, coalescing bursts of events and
/// invoking `on_fire` at most once per burst. An event whose path (and,
/// for renames, destination path) matches `ignore_patterns` is dropped
/// before it can start or extend a pending burst.
///
/// The debounce loop waits up to `wait_min` for the next event; if one
/// arrives, the wait restarts. Regardless, no later than `wait_max` after
/// the burst began, the coalescer fires and returns to idle.
pub fn watch<F>(
    paths: Vec<PathBuf>,
    ignore_patterns: Vec<String>,
    wait_min: Duration,
    wait_max: Duration,
    on_fire: F,
) -> Result<WatchHandle, WatchError>
where
    F: Fn() + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<RawEvent>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            let Ok(event) = res else { return };
            let mut paths = event.paths.into_iter();
            let Some(src) = paths.next() else { return };
            let dest = paths.next();
            let _ = tx.send(RawEvent { src, dest });
        },
        notify::Config::default(),
    )
    .map_err(|e| WatchError::Start(e.to_string()))?;

    for path in &paths {
        watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Watch { path: path.clone(), source: e.to_string() })?;
    }

    // The matcher's root is irrelevant to gitignore-style matching of
    // already-absolute paths; patterns are applied as given.
    let matcher = PathMatcher::new(Path::new("/"), &ignore_patterns);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_loop(rx, matcher, wait_min, wait_max, on_fire, cancel.clone()));

    Ok(WatchHandle { cancel, watcher, task })
}

fn is_ignored(matcher: &PathMatcher, event: &RawEvent) -> bool {
    matcher.matches(&event.src) && event.dest.as_ref().map_or(true, |d| matcher.matches(d))
}

async fn run_loop<F>(
    mut rx: mpsc::UnboundedReceiver<RawEvent>,
    matcher: PathMatcher,
    wait_min: Duration,
    wait_max: Duration,
    on_fire: F,
    cancel: CancellationToken,
) where
    F: Fn() + Send + Sync + 'static,
{
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return,
            event = rx.recv() => match event {
                Some(event) => event,
                None => return,
            },
        };

        if is_ignored(&matcher, &event) {
            debug!(component = "watch", action = "receive_event", status = "ignored");
            continue;
        }

        debug!(component = "watch", action = "receive_event", status = "pending_start");
        let start = Instant::now();

        'burst: loop {
            let max_time = start + wait_max;
            let now = Instant::now();
            if now >= max_time {
                break 'burst;
            }
            let remaining_to_max = max_time - now;
            let next_wait = wait_min.min(remaining_to_max);

            tokio::select! {
                _ = cancel.cancelled() => return,
                event = rx.recv() => match event {
                    None => break 'burst,
                    Some(event) => {
                        if is_ignored(&matcher, &event) {
                            continue 'burst;
                        }
                        debug!(component = "watch", action = "receive_event", status = "pending_extend");
                        continue 'burst;
                    }
                },
                _ = tokio::time::sleep(next_wait) => {
                    break 'burst;
                }
            }
        }

        info!(component = "watch", action = "fire");
        on_fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn noop_matcher() -> PathMatcher {
        PathMatcher::new(Path::new("/"), &[])
    }

    #[tokio::test(start_paused = true)]
    async fn single_event_fires_after_wait_min() {
        let (tx, rx) = mpsc::unbounded_channel();
        let fires = Arc::new(AtomicUsize::new(0));
        let fires_clone = fires.clone();
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        let handle = tokio::spawn(run_loop(
            rx,
            noop_matcher(),
            Duration::from_secs(1),
            Duration::from_secs(60),
            move || {
                fires_clone.fetch_add(1, Ordering::SeqCst);
            },
            cancel_clone,
        ));

        tx.send(RawEvent { src: PathBuf::from("/a"), dest: None }).unwrap();
        tokio::time::advance(Duration::from_millis(999)).await;
        tokio::task::yield_now().await;
        assert_eq!(fires.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;
        assert_eq!(fires.load(Ordering::SeqCst), 1);

        cancel.cancel();
        let _ = handle.await;
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_events_defers_fire_until_wait_max() {
        let (tx, rx) = mpsc::unbounded_channel();
        let fires = Arc::new(AtomicUsize::new(0));
        let fires_clone = fires.clone();
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        let wait_min = Duration::from_secs(1);
        let wait_max = Duration::from_secs(3);

        let handle = tokio::spawn(run_loop(
            rx,
            noop_matcher(),
            wait_min,
            wait_max,
            move || {
                fires_clone.fetch_add(1, Ordering::SeqCst);
            },
            cancel_clone,
        ));

        // Events at t=0, 0.5, 1.0, 1.5, 2.0s keep extending the burst, but
        // wait_max caps the fire at t=3s from the first event.
        tx.send(RawEvent { src: PathBuf::from("/a"), dest: None }).unwrap();
        for _ in 0..4 {
            tokio::time::advance(Duration::from_millis(500)).await;
            tokio::task::yield_now().await;
            tx.send(RawEvent { src: PathBuf::from("/a"), dest: None }).unwrap();
            tokio::task::yield_now().await;
        }
        assert_eq!(fires.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(1000)).await;
        tokio::task::yield_now().await;
        assert_eq!(fires.load(Ordering::SeqCst), 1);

        cancel.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn ignored_events_do_not_start_a_burst() {
        let (tx, rx) = mpsc::unbounded_channel();
        let fires = Arc::new(AtomicUsize::new(0));
        let fires_clone = fires.clone();
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        let matcher = PathMatcher::new(Path::new("/"), &["*.log".to_string()]);

        let handle = tokio::spawn(run_loop(
            rx,
            matcher,
            Duration::from_millis(10),
            Duration::from_millis(50),
            move || {
                fires_clone.fetch_add(1, Ordering::SeqCst);
            },
            cancel_clone,
        ));

        tx.send(RawEvent { src: PathBuf::from("/var/log/app.log"), dest: None }).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fires.load(Ordering::SeqCst), 0);

        cancel.cancel();
        let _ = handle.await;
    }
}
