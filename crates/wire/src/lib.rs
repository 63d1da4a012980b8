// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! snapd-wire: the JSON-RPC 2.0 envelope and method/params/result types
//! exchanged over the Control API (C8), shared by the daemon and the CLI
//! client.

mod method;
mod params;
mod rpc;

pub use method::Method;
pub use params::{
    BackupParams, CheckRepositoryParams, ExplainSnapshotParams, ListSnapshotsParams,
    PruneParams, RestoreSnapshotParams,
};
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of `get_config_summary`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub hostname: String,
    pub repositories: BTreeMap<String, RepositorySummary>,
    pub backups: BTreeMap<String, BackupSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSummary {
    pub repositories: Vec<String>,
}

/// A single row returned by `list_snapshots`, in the engine's own casing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Hostname")]
    pub hostname: String,
    #[serde(rename = "Backup")]
    pub backup: Option<String>,
    #[serde(rename = "Repository")]
    pub repository: String,
    #[serde(rename = "Id")]
    pub id: String,
}

/// Result of `explain_snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainSnapshotResult {
    pub repository_name: String,
    pub backup_name: Option<String>,
    pub snapshot_id: String,
    pub objects: Vec<serde_json::Value>,
}
