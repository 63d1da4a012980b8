// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire shapes as they appear in the TOML file, and the transform into
//! `snapd_core` types. Kept separate from `lib.rs` so the public surface
//! only ever exposes validated domain types.

use crate::LoadedConfig;
use serde::Deserialize;
use snapd_core::units::{parse_duration, parse_size_kib};
use snapd_core::{
    ApiConfig, ApiCredentials, Backup, ConfigError, HookOnFailure, HookSpec, HostConfig,
    HttpMethod, ProviderEnvelope, PruneSpec, Repository, RepositoryCheck, RetentionPolicy,
    WatchSpec, WatchWait,
};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Provider keys recognized in a repository table, per spec.md §6.
const PROVIDER_KEYS: &[&str] = &["os", "aws", "st", "b2", "azure", "google", "rclone"];

#[derive(Debug, Deserialize)]
pub(crate) struct RawConfig {
    pub hostname: String,
    #[serde(rename = "uploadLimit", default)]
    pub upload_limit: Option<String>,
    #[serde(rename = "downloadLimit", default)]
    pub download_limit: Option<String>,
    #[serde(rename = "logLevel", default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub api: Option<RawApi>,
    #[serde(default)]
    pub repositories: BTreeMap<String, RawRepository>,
    #[serde(default)]
    pub backups: BTreeMap<String, RawBackup>,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawApi {
    pub port: u16,
    pub credentials: RawCredentials,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRepository {
    pub location: String,
    pub password: String,
    #[serde(default)]
    pub check: Option<RawCheck>,
    #[serde(flatten)]
    pub rest: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCheck {
    pub schedules: Vec<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBackup {
    pub paths: Vec<String>,
    #[serde(rename = "ignorePatterns", default)]
    pub ignore_patterns: Vec<String>,
    pub repositories: Vec<String>,
    #[serde(default)]
    pub schedules: Vec<String>,
    #[serde(default)]
    pub watch: Option<RawWatch>,
    #[serde(default)]
    pub prune: Option<RawPrune>,
    #[serde(default)]
    pub hooks: Option<RawHooks>,
    #[serde(rename = "uploadLimit", default)]
    pub upload_limit: Option<String>,
    #[serde(rename = "downloadLimit", default)]
    pub download_limit: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawWatch {
    Enabled(bool),
    Configured { wait: RawWait },
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawWait {
    pub min: String,
    pub max: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPrune {
    #[serde(default)]
    pub schedules: Vec<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(rename = "retentionPolicy", default)]
    pub retention_policy: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawHooks {
    pub before: Option<RawHook>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawHook {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    pub timeout: String,
    pub retries: u32,
    #[serde(default)]
    pub onfailure: Option<String>,
}

pub(crate) fn transform(raw: RawConfig) -> Result<LoadedConfig, ConfigError> {
    let mut repositories = BTreeMap::new();
    for (name, repo) in raw.repositories {
        let name = name.to_ascii_lowercase();
        repositories.insert(name.clone(), transform_repository(name, repo)?);
    }

    let mut backups = BTreeMap::new();
    for (name, backup) in raw.backups {
        let name = name.to_ascii_lowercase();
        backups.insert(name.clone(), transform_backup(name, backup, &repositories)?);
    }

    let host = HostConfig {
        hostname: raw.hostname.to_ascii_lowercase(),
        upload_limit_kib: raw.upload_limit.as_deref().map(parse_size_kib).transpose()?,
        download_limit_kib: raw.download_limit.as_deref().map(parse_size_kib).transpose()?,
        log_level: raw.log_level,
        api: raw.api.map(transform_api),
    };

    Ok(LoadedConfig { host, repositories, backups })
}

fn transform_api(raw: RawApi) -> ApiConfig {
    ApiConfig {
        port: raw.port,
        credentials: ApiCredentials {
            username: raw.credentials.username,
            password: raw.credentials.password,
        },
    }
}

fn transform_repository(name: String, raw: RawRepository) -> Result<Repository, ConfigError> {
    let mut provider_env = ProviderEnvelope::default();
    for provider in PROVIDER_KEYS {
        if let Some(value) = raw.rest.get(*provider) {
            provider_env.merge(flatten_provider(provider, value)?);
        }
    }

    let check = raw
        .check
        .map(|c| -> Result<RepositoryCheck, ConfigError> {
            Ok(RepositoryCheck {
                schedules: c.schedules,
                priority: c.priority.as_deref().map(parse_priority).transpose()?,
            })
        })
        .transpose()?;

    Ok(Repository { name, location: raw.location, password: raw.password, provider_env, check })
}

fn flatten_provider(provider: &str, value: &toml::Value) -> Result<ProviderEnvelope, ConfigError> {
    let mut out = BTreeMap::new();
    flatten_into(&provider.to_ascii_uppercase(), value, &mut out)?;
    Ok(ProviderEnvelope(out))
}

fn flatten_into(
    prefix: &str,
    value: &toml::Value,
    out: &mut BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    match value {
        toml::Value::Table(table) => {
            for (key, nested) in table {
                let joined = format!("{prefix}_{}", key.to_ascii_uppercase());
                flatten_into(&joined, nested, out)?;
            }
            Ok(())
        }
        toml::Value::Array(items) => {
            let joined = items
                .iter()
                .map(scalar_to_string)
                .collect::<Result<Vec<_>, _>>()?
                .join(",");
            out.insert(prefix.to_string(), joined);
            Ok(())
        }
        other => {
            out.insert(prefix.to_string(), scalar_to_string(other)?);
            Ok(())
        }
    }
}

fn scalar_to_string(value: &toml::Value) -> Result<String, ConfigError> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        other => Err(ConfigError::Invalid(format!("unsupported provider value: {other:?}"))),
    }
}

fn transform_backup(
    name: String,
    raw: RawBackup,
    repositories: &BTreeMap<String, Repository>,
) -> Result<Backup, ConfigError> {
    let target_repos: Vec<String> = raw.repositories.iter().map(|r| r.to_ascii_lowercase()).collect();
    for repo_name in &target_repos {
        if !repositories.contains_key(repo_name) {
            return Err(ConfigError::UnknownRepository {
                backup: name.clone(),
                repository: repo_name.clone(),
            });
        }
    }
    if target_repos.is_empty() {
        return Err(ConfigError::Invalid(format!("backup {name:?} targets no repositories")));
    }

    let watch = raw.watch.map(transform_watch).transpose()?;
    let prune = raw.prune.map(transform_prune).transpose()?;
    let before_hook = raw
        .hooks
        .and_then(|h| h.before)
        .map(transform_hook)
        .transpose()?;

    Ok(Backup {
        name,
        paths: raw.paths,
        ignore_patterns: raw.ignore_patterns,
        repositories: target_repos,
        schedules: raw.schedules,
        watch,
        prune,
        before_hook,
        bandwidth_upload_kib: raw.upload_limit.as_deref().map(parse_size_kib).transpose()?,
        bandwidth_download_kib: raw.download_limit.as_deref().map(parse_size_kib).transpose()?,
        priority: raw.priority.as_deref().map(parse_priority).transpose()?.unwrap_or_default(),
    })
}

fn transform_watch(raw: RawWatch) -> Result<WatchSpec, ConfigError> {
    match raw {
        RawWatch::Enabled(b) => Ok(WatchSpec::Enabled(b)),
        RawWatch::Configured { wait } => Ok(WatchSpec::Configured(WatchWait {
            min: parse_duration(&wait.min)?,
            max: parse_duration(&wait.max)?,
        })),
    }
}

fn transform_prune(raw: RawPrune) -> Result<PruneSpec, ConfigError> {
    Ok(PruneSpec {
        schedules: raw.schedules,
        priority: raw.priority.as_deref().map(parse_priority).transpose()?,
        retention_policy: transform_retention_policy(raw.retention_policy)?,
    })
}

/// `nbOfdaily` is a documented casing typo in the original implementation;
/// every key is matched case-insensitively to preserve its behavior.
fn transform_retention_policy(
    raw: BTreeMap<String, toml::Value>,
) -> Result<RetentionPolicy, ConfigError> {
    let mut policy = RetentionPolicy::default();
    for (key, value) in raw {
        match key.to_ascii_lowercase().as_str() {
            "nbofhourly" => policy.nb_of_hourly = Some(value_as_u32(&key, &value)?),
            "nbofdaily" => policy.nb_of_daily = Some(value_as_u32(&key, &value)?),
            "nbofweekly" => policy.nb_of_weekly = Some(value_as_u32(&key, &value)?),
            "nbofmonthly" => policy.nb_of_monthly = Some(value_as_u32(&key, &value)?),
            "nbofyearly" => policy.nb_of_yearly = Some(value_as_u32(&key, &value)?),
            "mintime" => policy.min_time = Some(value_as_string(&key, &value)?),
            _ => return Err(ConfigError::UnknownRetentionKey(key)),
        }
    }
    Ok(policy)
}

fn value_as_u32(key: &str, value: &toml::Value) -> Result<u32, ConfigError> {
    value
        .as_integer()
        .and_then(|i| u32::try_from(i).ok())
        .ok_or_else(|| ConfigError::Invalid(format!("retention key {key:?} must be a positive integer")))
}

fn value_as_string(key: &str, value: &toml::Value) -> Result<String, ConfigError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::Invalid(format!("retention key {key:?} must be a string")))
}

fn transform_hook(raw: RawHook) -> Result<HookSpec, ConfigError> {
    if raw.kind != "http" {
        return Err(ConfigError::Invalid(format!("unsupported hook type {:?}", raw.kind)));
    }
    let method = raw
        .method
        .as_deref()
        .map(parse_http_method)
        .transpose()?
        .unwrap_or_default();
    let onfailure = raw
        .onfailure
        .as_deref()
        .map(parse_onfailure)
        .transpose()?
        .unwrap_or_default();

    Ok(HookSpec {
        url: raw.url,
        method,
        timeout: parse_duration(&raw.timeout)?,
        retries: raw.retries,
        onfailure,
    })
}

fn parse_http_method(raw: &str) -> Result<HttpMethod, ConfigError> {
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(HttpMethod::Get),
        "POST" => Ok(HttpMethod::Post),
        "PUT" => Ok(HttpMethod::Put),
        "DELETE" => Ok(HttpMethod::Delete),
        "PATCH" => Ok(HttpMethod::Patch),
        other => Err(ConfigError::Invalid(format!("unknown hook method {other:?}"))),
    }
}

fn parse_onfailure(raw: &str) -> Result<HookOnFailure, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "ignore" => Ok(HookOnFailure::Ignore),
        "continue" => Ok(HookOnFailure::Continue),
        "stop" => Ok(HookOnFailure::Stop),
        other => Err(ConfigError::Invalid(format!("unknown hook onfailure {other:?}"))),
    }
}

fn parse_priority(raw: &str) -> Result<snapd_core::Priority, ConfigError> {
    snapd_core::Priority::from_str(raw).map_err(ConfigError::Invalid)
}
