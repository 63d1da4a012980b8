// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error hierarchy: ConfigError, EngineError and HookError are
//! typed here so every crate shares the same vocabulary. AuthError and
//! ProtocolError (Control API specific) live in `snapd-wire`/`snapd-daemon`
//! since they are transport-layer concerns.

use thiserror::Error;

/// Invalid schedule/duration/size unit, missing required key, reference to
/// an unknown repository, or an unknown retention-policy key. Fatal at
/// startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid unit {unit:?} in {raw:?}")]
    InvalidUnit { raw: String, unit: char },

    #[error("missing required config key: {0}")]
    MissingKey(String),

    #[error("backup {backup:?} references unknown repository {repository:?}")]
    UnknownRepository { backup: String, repository: String },

    #[error("unknown retention policy key: {0}")]
    UnknownRetentionKey(String),

    #[error("invalid schedule expression: {0:?}")]
    InvalidSchedule(String),

    #[error("duplicate name: {0:?}")]
    DuplicateName(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Non-zero exit from the snapshot engine; carries the collected output.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("engine command exited with code {code}")]
pub struct EngineError {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// HTTP non-2xx or transport error from a backup hook, after retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HookError {
    #[error("hook returned status {status}")]
    Status { status: u16, body: String },

    #[error("hook request failed: {0}")]
    Transport(String),

    #[error("hook timed out")]
    Timeout,
}
