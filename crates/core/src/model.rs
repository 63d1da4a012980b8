// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The declarative data model: Repository, Backup, HostConfig
//! and their nested specs. Built by `snapd-config` at load time; immutable
//! thereafter.

use crate::priority::Priority;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A flat mapping of upper-snake-case environment variable names to values,
/// exported to the snapshot engine subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEnvelope(pub BTreeMap<String, String>);

impl ProviderEnvelope {
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn merge(&mut self, other: ProviderEnvelope) {
        self.0.extend(other.0);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryCheck {
    pub schedules: Vec<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

/// A snapshot destination managed by the snapshot engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub location: String,
    pub password: String,
    #[serde(default)]
    pub provider_env: ProviderEnvelope,
    #[serde(default)]
    pub check: Option<RepositoryCheck>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchWait {
    pub min: Duration,
    pub max: Duration,
}

impl Default for WatchWait {
    fn default() -> Self {
        Self { min: Duration::from_secs(1), max: Duration::from_secs(60) }
    }
}

/// `watch` is either `bool` or `{wait: {min, max}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchSpec {
    Enabled(bool),
    Configured(WatchWait),
}

impl WatchSpec {
    pub fn is_enabled(&self) -> bool {
        match self {
            WatchSpec::Enabled(b) => *b,
            WatchSpec::Configured(_) => true,
        }
    }

    pub fn wait(&self) -> WatchWait {
        match self {
            WatchSpec::Enabled(_) => WatchWait::default(),
            WatchSpec::Configured(wait) => *wait,
        }
    }
}

/// Retention policy for `prune`.
///
/// `nb_of_daily` accepts the `nbOfDaily`/`nbOfdaily` case-typo alias at
/// config-load time; by the time it reaches
/// this struct the key has already been normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub nb_of_hourly: Option<u32>,
    pub nb_of_daily: Option<u32>,
    pub nb_of_weekly: Option<u32>,
    pub nb_of_monthly: Option<u32>,
    pub nb_of_yearly: Option<u32>,
    pub min_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneSpec {
    #[serde(default)]
    pub schedules: Vec<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    pub retention_policy: RetentionPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookOnFailure {
    Ignore,
    Continue,
    Stop,
}

impl Default for HookOnFailure {
    fn default() -> Self {
        HookOnFailure::Stop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Default for HttpMethod {
    fn default() -> Self {
        HttpMethod::Post
    }
}

/// Only `type: "http"` is supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookSpec {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub timeout: Duration,
    pub retries: u32,
    #[serde(default)]
    pub onfailure: HookOnFailure,
}

/// A named set of source paths targeting one or more repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    pub name: String,
    pub paths: Vec<String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    pub repositories: Vec<String>,
    #[serde(default)]
    pub schedules: Vec<String>,
    #[serde(default)]
    pub watch: Option<WatchSpec>,
    #[serde(default)]
    pub prune: Option<PruneSpec>,
    #[serde(default)]
    pub before_hook: Option<HookSpec>,
    #[serde(default)]
    pub bandwidth_upload_kib: Option<u64>,
    #[serde(default)]
    pub bandwidth_download_kib: Option<u64>,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub credentials: ApiCredentials,
}

/// Host-wide configuration: hostname, global limits, log level, optional
/// Control API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    pub hostname: String,
    #[serde(default)]
    pub upload_limit_kib: Option<u64>,
    #[serde(default)]
    pub download_limit_kib: Option<u64>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub api: Option<ApiConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}
