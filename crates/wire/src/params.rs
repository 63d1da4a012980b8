// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-method request parameters for the Control API's fixed method set.

use serde::{Deserialize, Serialize};
use snapd_core::Priority;

fn default_sort() -> String {
    "Date".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSnapshotsParams {
    #[serde(default)]
    pub repository_name: Option<String>,
    #[serde(default)]
    pub backup_name: Option<String>,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl Default for ListSnapshotsParams {
    fn default() -> Self {
        Self {
            repository_name: None,
            backup_name: None,
            sort: default_sort(),
            reverse: false,
            priority: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainSnapshotParams {
    pub repository_name: String,
    pub snapshot_id: String,
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupParams {
    pub backup_name: String,
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreSnapshotParams {
    pub repository_name: String,
    pub snapshot: String,
    #[serde(default)]
    pub target_path: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRepositoryParams {
    pub repository_name: String,
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneParams {
    pub backup_name: String,
    #[serde(default)]
    pub priority: Option<Priority>,
}
