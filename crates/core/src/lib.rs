// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! snapd-core: domain types shared by every crate in the backup orchestrator.

pub mod clock;
pub mod error;
pub mod model;
pub mod priority;
pub mod trace;
pub mod units;


pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{ConfigError, EngineError, HookError};
pub use model::{
    ApiConfig, ApiCredentials, Backup, HookOnFailure, HookSpec, HostConfig, HttpMethod,
    ProviderEnvelope, PruneSpec, Repository, RepositoryCheck, RetentionPolicy, WatchSpec,
    WatchWait,
};
pub use priority::Priority;
pub use trace::TraceNode;
