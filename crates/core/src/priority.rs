// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Task priority class.
///
/// Ordering for pending-queue head selection is `Immediate > Next > Normal`;
/// `Immediate` additionally bypasses the queue entirely when it is
/// non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Immediate,
    Next,
    Normal,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" => Ok(Priority::Immediate),
            "next" => Ok(Priority::Next),
            "normal" => Ok(Priority::Normal),
            other => Err(format!("invalid priority: {other}")),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Immediate => "immediate",
            Priority::Next => "next",
            Priority::Normal => "normal",
        };
        write!(f, "{s}")
    }
}
