// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! snapd-engine: the Task (C5), Task Manager (C6) and Schedule Source (C4)
//! components — everything that decides *when* and *in what order* work
//! runs, independent of what the work actually does.

mod manager;
mod schedule;
mod task;

pub use manager::{SubmitOutcome, TaskManager};
pub use schedule::{parse_schedules, subscribe, ScheduleExpr, ScheduleHandle};
pub use task::{Task, TaskError, TaskState};
