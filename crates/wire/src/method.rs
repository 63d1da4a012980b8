// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Control API's fixed method allowlist. Modeled as an explicit enum
//! rather than reflection/dynamic dispatch over method names.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GetConfigSummary,
    ListSnapshots,
    ExplainSnapshot,
    Backup,
    RestoreSnapshot,
    CheckRepository,
    Prune,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetConfigSummary => "get_config_summary",
            Self::ListSnapshots => "list_snapshots",
            Self::ExplainSnapshot => "explain_snapshot",
            Self::Backup => "backup",
            Self::RestoreSnapshot => "restore_snapshot",
            Self::CheckRepository => "check_repository",
            Self::Prune => "prune",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a method name isn't in the allowlist.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get_config_summary" => Ok(Self::GetConfigSummary),
            "list_snapshots" => Ok(Self::ListSnapshots),
            "explain_snapshot" => Ok(Self::ExplainSnapshot),
            "backup" => Ok(Self::Backup),
            "restore_snapshot" => Ok(Self::RestoreSnapshot),
            "check_repository" => Ok(Self::CheckRepository),
            "prune" => Ok(Self::Prune),
            other => Err(UnknownMethod(other.to_string())),
        }
    }
}
