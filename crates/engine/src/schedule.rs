// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The schedule source: fires a callback at the next instant among one or
//! more interval/cron expressions, optionally once at subscribe time.

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use snapd_core::{units::parse_duration, ConfigError};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

#[derive(Clone)]
pub enum ScheduleExpr {
    Interval(Duration),
    Cron(CronSchedule),
}

impl ScheduleExpr {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw.contains(' ') {
            let schedule = CronSchedule::from_str(raw)
                .map_err(|e| ConfigError::InvalidSchedule(format!("{raw}: {e}")))?;
            Ok(ScheduleExpr::Cron(schedule))
        } else {
            let duration = parse_duration(raw)?;
            Ok(ScheduleExpr::Interval(duration))
        }
    }

    /// The next fire instant strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScheduleExpr::Interval(duration) => {
                chrono::Duration::from_std(*duration).ok().map(|d| after + d)
            }
            ScheduleExpr::Cron(schedule) => schedule.after(&after).next(),
        }
    }
}

/// Parses a `;`-separated list of schedule expressions.
pub fn parse_schedules(raw: &[String]) -> Result<Vec<ScheduleExpr>, ConfigError> {
    raw.iter().map(|s| ScheduleExpr::parse(s)).collect()
}

/// Handle returned by [`subscribe`]. Dropping it does not cancel the
/// subscription; call [`ScheduleHandle::unsubscribe`] explicitly.
pub struct ScheduleHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ScheduleHandle {
    pub async fn unsubscribe(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Subscribes to the nearest next fire across `exprs`, invoking `on_fire`
/// each time, then re-arming against the next nearest instant. `on_error`
/// receives any error `on_fire` itself reports without cancelling the
/// subscription.
pub fn subscribe<F, E>(
    exprs: Vec<ScheduleExpr>,
    run_at_begin: bool,
    on_fire: F,
    on_error: E,
) -> ScheduleHandle
where
    F: Fn() -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync + 'static,
    E: Fn(Box<dyn std::error::Error + Send + Sync>) + Send + Sync + 'static,
{
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let on_fire = Arc::new(on_fire);
    let on_error = Arc::new(on_error);

    let task = tokio::spawn(async move {
        if run_at_begin {
            if let Err(e) = on_fire() {
                on_error(e);
            }
        }

        loop {
            let now = Utc::now();
            let next = exprs.iter().filter_map(|e| e.next_after(now)).min();
            let Some(next) = next else {
                error!(component = "schedule", action = "arm", status = "failure", "no expression produced a future fire time");
                return;
            };

            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = cancel_clone.cancelled() => return,
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = on_fire() {
                        on_error(e);
                    }
                }
            }
        }
    });

    ScheduleHandle { cancel, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use yare::parameterized;

    #[parameterized(
        seconds = { "30s" },
        minutes = { "5m" },
        hours = { "2h" },
        days = { "1d" },
        weeks = { "1w" },
    )]
    fn interval_expressions_parse(raw: &str) {
        let parsed = ScheduleExpr::parse(raw).unwrap();
        assert!(matches!(parsed, ScheduleExpr::Interval(_)));
    }

    #[test]
    fn cron_expressions_parse_on_whitespace() {
        let parsed = ScheduleExpr::parse("0 0 * * * *").unwrap();
        assert!(matches!(parsed, ScheduleExpr::Cron(_)));
    }

    #[test]
    fn invalid_expression_is_a_config_error() {
        assert!(ScheduleExpr::parse("nonsense").is_err());
    }

    #[tokio::test]
    async fn run_at_begin_fires_synchronously_before_the_first_interval() {
        let fires = Arc::new(AtomicUsize::new(0));
        let exprs = parse_schedules(&["1h".to_string()]).unwrap();
        let flag = fires.clone();
        let handle = subscribe(
            exprs,
            true,
            move || {
                flag.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            |_| {},
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fires.load(Ordering::SeqCst), 1);
        handle.unsubscribe().await;
    }

    #[tokio::test]
    async fn callback_error_is_reported_and_does_not_stop_the_subscription() {
        let errors = Arc::new(AtomicUsize::new(0));
        let fires = Arc::new(AtomicUsize::new(0));
        let exprs = parse_schedules(&["10s".to_string()]).unwrap();

        let err_flag = errors.clone();
        let fire_flag = fires.clone();
        let handle = subscribe(
            exprs,
            true,
            move || {
                fire_flag.fetch_add(1, Ordering::SeqCst);
                Err("boom".into())
            },
            move |_| {
                err_flag.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fires.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        handle.unsubscribe().await;
    }
}
