// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Daemon (C7): owns the loaded configuration, the task manager, the
//! engine invoker, and every schedule/watch subscription. Every public
//! method here mirrors one operation of `original_source/daemon.py`'s
//! `Daemon` class.

use parking_lot::Mutex;
use snapd_adapters::{EngineInvoker, InvokeRequest, ProcessRegistry};
use snapd_config::LoadedConfig;
use snapd_core::{
    Backup, ConfigError, EngineError, HookOnFailure, HostConfig, Priority, Repository,
    RetentionPolicy, TraceNode,
};
use snapd_engine::{parse_schedules, subscribe, Task, TaskError, TaskManager, ScheduleHandle};
use snapd_wire::{BackupSummary, ConfigSummary, ExplainSnapshotResult, RepositorySummary, SnapshotEntry};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("unknown repository {0:?}")]
    UnknownRepository(String),
    #[error("unknown backup {0:?}")]
    UnknownBackup(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Watch(#[from] snapd_watch::WatchError),
    #[error("task failed: {0}")]
    Task(#[from] TaskError),
    #[error("{0}")]
    Invalid(String),
}

fn shell_quote(value: &str) -> String {
    shell_escape::escape(std::borrow::Cow::Borrowed(value)).into_owned()
}

fn repository_env(repo: &Repository) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("RESTIC_REPOSITORY".to_string(), repo.location.clone());
    env.insert("RESTIC_PASSWORD".to_string(), repo.password.clone());
    for (k, v) in repo.provider_env.iter() {
        env.insert(k.clone(), v.clone());
    }
    env
}

/// `--limit-upload`/`--limit-download`, with a per-backup override taking
/// precedence over the host-wide default.
fn global_opts(host: &HostConfig, backup: Option<&Backup>) -> Vec<String> {
    let mut opts = Vec::new();
    let upload = backup.and_then(|b| b.bandwidth_upload_kib).or(host.upload_limit_kib);
    let download = backup.and_then(|b| b.bandwidth_download_kib).or(host.download_limit_kib);
    if let Some(u) = upload {
        opts.push("--limit-upload".to_string());
        opts.push(u.to_string());
    }
    if let Some(d) = download {
        opts.push("--limit-download".to_string());
        opts.push(d.to_string());
    }
    opts
}

fn retention_args(policy: &RetentionPolicy) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(n) = policy.nb_of_hourly {
        args.push("--keep-hourly".to_string());
        args.push(n.to_string());
    }
    if let Some(n) = policy.nb_of_daily {
        args.push("--keep-daily".to_string());
        args.push(n.to_string());
    }
    if let Some(n) = policy.nb_of_weekly {
        args.push("--keep-weekly".to_string());
        args.push(n.to_string());
    }
    if let Some(n) = policy.nb_of_monthly {
        args.push("--keep-monthly".to_string());
        args.push(n.to_string());
    }
    if let Some(n) = policy.nb_of_yearly {
        args.push("--keep-yearly".to_string());
        args.push(n.to_string());
    }
    if let Some(t) = &policy.min_time {
        args.push("--keep-within".to_string());
        args.push(t.clone());
    }
    args
}

/// Best-effort `unlock`, run ahead of every other repository operation.
/// Failures are swallowed: an already-unlocked repository is the common
/// case and isn't worth failing the caller over.
async fn unlock(invoker: &dyn EngineInvoker, host: &HostConfig, repo: &Repository, trace: &TraceNode) {
    let req = InvokeRequest::new("unlock", trace.extend("unlock"))
        .args(global_opts(host, None))
        .env(repository_env(repo));
    let _ = invoker.invoke(req).await;
}

#[derive(serde::Deserialize)]
struct RawSnapshot {
    id: String,
    hostname: String,
    time: String,
    #[serde(default)]
    tags: Vec<String>,
}

fn backup_tag(backup_name: &str) -> String {
    format!("backup-{backup_name}")
}

fn tag_to_backup_name(tags: &[String]) -> Option<String> {
    tags.iter().find_map(|t| t.strip_prefix("backup-").map(str::to_string))
}

fn sort_snapshots(rows: &mut [SnapshotEntry], column: &str, reverse: bool) -> Result<(), DaemonError> {
    let key_of = |row: &SnapshotEntry| -> String {
        match column {
            "Date" => row.date.clone(),
            "Hostname" => row.hostname.clone(),
            "Backup" => row.backup.clone().unwrap_or_default(),
            "Repository" => row.repository.clone(),
            "Id" => row.id.clone(),
            _ => String::new(),
        }
    };
    if !["Date", "Hostname", "Backup", "Repository", "Id"].contains(&column) {
        return Err(DaemonError::Invalid(format!("unknown sort column {column:?}")));
    }
    rows.sort_by_key(key_of);
    if reverse {
        rows.reverse();
    }
    Ok(())
}

pub struct Orchestrator {
    config: LoadedConfig,
    invoker: Arc<dyn EngineInvoker>,
    registry: ProcessRegistry,
    manager: Arc<TaskManager>,
    hook_client: reqwest::Client,
    schedules: Mutex<Vec<ScheduleHandle>>,
    watchers: Mutex<Vec<snapd_watch::WatchHandle>>,
}

impl Orchestrator {
    pub fn new(config: LoadedConfig, invoker: Arc<dyn EngineInvoker>, registry: ProcessRegistry) -> Arc<Self> {
        Arc::new(Self {
            config,
            invoker,
            registry,
            manager: Arc::new(TaskManager::new()),
            hook_client: reqwest::Client::new(),
            schedules: Mutex::new(Vec::new()),
            watchers: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &LoadedConfig {
        &self.config
    }

    /// Starts the task manager worker, submits an `init` for every
    /// configured repository, and arms every schedule and filesystem
    /// watcher declared in the config.
    pub fn start(self: &Arc<Self>) -> Result<(), DaemonError> {
        self.manager.start();

        for repo_name in self.config.repositories.keys() {
            self.init_repository(repo_name);
        }

        let mut schedules = Vec::new();
        let mut watchers = Vec::new();

        for (repo_name, repo) in &self.config.repositories {
            if let Some(check) = &repo.check {
                if !check.schedules.is_empty() {
                    let exprs = parse_schedules(&check.schedules)?;
                    let this = self.clone();
                    let name = repo_name.clone();
                    schedules.push(subscribe(
                        exprs,
                        true,
                        move || {
                            this.check_repository(&name, None);
                            Ok(())
                        },
                        |e| tracing::error!(component = "daemon", action = "schedule", error = %e, "check_repository schedule callback failed"),
                    ));
                }
            }
        }

        for (backup_name, backup) in &self.config.backups {
            if !backup.schedules.is_empty() {
                let exprs = parse_schedules(&backup.schedules)?;
                let this = self.clone();
                let name = backup_name.clone();
                schedules.push(subscribe(
                    exprs,
                    true,
                    move || {
                        this.backup(&name, None, Some(TraceNode::root("Daemon-schedule")));
                        Ok(())
                    },
                    |e| tracing::error!(component = "daemon", action = "schedule", error = %e, "backup schedule callback failed"),
                ));
            }

            if let Some(watch) = &backup.watch {
                if watch.is_enabled() {
                    let wait = watch.wait();
                    let roots: Vec<PathBuf> = backup.paths.iter().map(PathBuf::from).collect();
                    let this = self.clone();
                    let name = backup_name.clone();
                    let handle = snapd_watch::watch(roots, backup.ignore_patterns.clone(), wait.min, wait.max, move || {
                        this.backup(&name, None, Some(TraceNode::root("Daemon-watch")));
                    })?;
                    watchers.push(handle);
                }
            }

            if let Some(prune) = &backup.prune {
                if !prune.schedules.is_empty() {
                    let exprs = parse_schedules(&prune.schedules)?;
                    let this = self.clone();
                    let name = backup_name.clone();
                    schedules.push(subscribe(
                        exprs,
                        false,
                        move || {
                            this.prune(&name, None);
                            Ok(())
                        },
                        |e| tracing::error!(component = "daemon", action = "schedule", error = %e, "prune schedule callback failed"),
                    ));
                }
            }
        }

        *self.schedules.lock() = schedules;
        *self.watchers.lock() = watchers;
        Ok(())
    }

    /// Tears down every schedule and watcher, drains the task manager, then
    /// broadcasts SIGINT to any snapshot-engine subprocess still alive.
    pub async fn stop(&self) {
        let schedules: Vec<_> = self.schedules.lock().drain(..).collect();
        for handle in schedules {
            handle.unsubscribe().await;
        }
        let watchers: Vec<_> = self.watchers.lock().drain(..).collect();
        for handle in watchers {
            handle.stop().await;
        }
        self.manager.stop().await;
        self.registry.broadcast_sigint();
    }

    fn resolve_repo_set(&self, repository: Option<&str>, backup: Option<&str>) -> Result<Vec<String>, DaemonError> {
        if let Some(r) = repository {
            if !self.config.repositories.contains_key(r) {
                return Err(DaemonError::UnknownRepository(r.to_string()));
            }
            return Ok(vec![r.to_string()]);
        }
        if let Some(b) = backup {
            let backup = self.config.backups.get(b).ok_or_else(|| DaemonError::UnknownBackup(b.to_string()))?;
            return Ok(backup.repositories.clone());
        }
        Ok(self.config.repositories.keys().cloned().collect())
    }

    pub fn init_repository(&self, repo_name: &str) {
        let Some(repo) = self.config.repositories.get(repo_name).cloned() else {
            tracing::warn!(component = "daemon", action = "init_repository", repository = repo_name, "unknown repository");
            return;
        };
        let host = self.config.host.clone();
        let invoker = self.invoker.clone();
        let id = format!("init_repo_{repo_name}");
        let task = Task::new(id, Priority::Next, async move {
            let trace = TraceNode::root("Daemon-lifecycle").extend(format!("init_repository_{}", repo.name));
            tracing::info!(component = "daemon", action = "init_repository", repository = %repo.name, status = "starting", node = %trace, "initializing repository");
            let req = InvokeRequest::new("init", trace.clone()).args(global_opts(&host, None)).env(repository_env(&repo));
            match invoker.invoke(req).await {
                Ok(_) => {
                    tracing::info!(component = "daemon", action = "init_repository", repository = %repo.name, status = "success", node = %trace, "repository initialized");
                }
                Err(e) => {
                    // An already-initialized repository also exits non-zero;
                    // this is routine, not an operator-facing failure.
                    tracing::info!(component = "daemon", action = "init_repository", repository = %repo.name, status = "skipped", node = %trace, error = %e, "init did not succeed (repository may already exist)");
                }
            }
            unlock(invoker.as_ref(), &host, &repo, &trace).await;
            Ok(())
        });
        self.manager.submit(task, Priority::Next, true);
    }

    pub fn check_repository(&self, repo_name: &str, priority: Option<Priority>) {
        let Some(repo) = self.config.repositories.get(repo_name).cloned() else {
            tracing::warn!(component = "daemon", action = "check_repository", repository = repo_name, "unknown repository");
            return;
        };
        let priority = priority
            .or_else(|| repo.check.as_ref().and_then(|c| c.priority))
            .unwrap_or(Priority::Normal);
        let host = self.config.host.clone();
        let invoker = self.invoker.clone();
        let id = format!("check_repo_{repo_name}");
        let task = Task::new(id, priority, async move {
            let trace = TraceNode::root("Daemon-check").extend(format!("repository_{}", repo.name));
            tracing::info!(component = "daemon", action = "check_repository", repository = %repo.name, status = "starting", node = %trace, "checking repository");
            unlock(invoker.as_ref(), &host, &repo, &trace).await;
            let req = InvokeRequest::new("check", trace.clone()).args(global_opts(&host, None)).env(repository_env(&repo));
            match invoker.invoke(req).await {
                Ok(_) => {
                    tracing::info!(component = "daemon", action = "check_repository", repository = %repo.name, status = "success", node = %trace, "repository check passed");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(component = "daemon", action = "check_repository", repository = %repo.name, status = "failure", node = %trace, error = %e, "repository check failed");
                    Err(TaskError::new(e.to_string()))
                }
            }
        });
        self.manager.submit(task, priority, true);
    }

    pub fn restore_snapshot(&self, repo_name: &str, snapshot: &str, target: Option<String>, priority: Priority) {
        let Some(repo) = self.config.repositories.get(repo_name).cloned() else {
            tracing::warn!(component = "daemon", action = "restore_snapshot", repository = repo_name, "unknown repository");
            return;
        };
        let target = target.unwrap_or_else(|| "/".to_string());
        let host = self.config.host.clone();
        let invoker = self.invoker.clone();
        let snapshot_owned = snapshot.to_string();
        let id = format!("restore_snap_{repo_name}_{snapshot}");
        let task = Task::new(id, priority, async move {
            let trace = TraceNode::root("Daemon-api").extend(format!("restore_{}", repo.name));
            tracing::info!(component = "daemon", action = "restore_snapshot", repository = %repo.name, snapshot = %snapshot_owned, status = "starting", node = %trace, "restoring snapshot");
            unlock(invoker.as_ref(), &host, &repo, &trace).await;
            let mut args = vec![snapshot_owned.clone(), "--target".to_string(), target];
            args.extend(global_opts(&host, None));
            let req = InvokeRequest::new("restore", trace.clone()).args(args).env(repository_env(&repo));
            match invoker.invoke(req).await {
                Ok(_) => {
                    tracing::info!(component = "daemon", action = "restore_snapshot", repository = %repo.name, snapshot = %snapshot_owned, status = "success", node = %trace, "snapshot restored");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(component = "daemon", action = "restore_snapshot", repository = %repo.name, snapshot = %snapshot_owned, status = "failure", node = %trace, error = %e, "restore failed");
                    Err(TaskError::new(e.to_string()))
                }
            }
        });
        self.manager.submit(task, priority, true);
    }

    pub fn prune(&self, backup_name: &str, priority: Option<Priority>) {
        let Some(backup) = self.config.backups.get(backup_name).cloned() else {
            tracing::warn!(component = "daemon", action = "prune", backup = backup_name, "unknown backup");
            return;
        };
        let Some(prune_spec) = backup.prune.clone() else {
            tracing::warn!(component = "daemon", action = "prune", backup = backup_name, "backup has no prune policy configured");
            return;
        };
        let priority = priority.or(prune_spec.priority).unwrap_or(Priority::Normal);
        let repositories = self.config.repositories.clone();
        let host = self.config.host.clone();
        let invoker = self.invoker.clone();
        let id = format!("prune_{backup_name}");
        let task = Task::new(id, priority, async move {
            let node = TraceNode::root("Daemon-prune").extend(format!("prune_{}", backup.name));
            tracing::info!(component = "daemon", action = "prune", backup = %backup.name, status = "starting", node = %node, "starting prune");

            let mut all_ok = true;
            for repo_name in &backup.repositories {
                let Some(repo) = repositories.get(repo_name) else {
                    tracing::error!(component = "daemon", action = "prune", backup = %backup.name, repository = %repo_name, status = "failure", node = %node, "repository not found");
                    all_ok = false;
                    continue;
                };
                let repo_node = node.extend(format!("repository_{repo_name}"));
                tracing::info!(component = "daemon", action = "prune", subaction = "prune_repository", backup = %backup.name, repository = %repo_name, status = "starting", node = %repo_node, "pruning repository");

                let mut options = vec![
                    "--prune".to_string(),
                    "--tag".to_string(),
                    shell_quote(&backup_tag(&backup.name)),
                    "--host".to_string(),
                    host.hostname.clone(),
                ];
                options.extend(global_opts(&host, Some(&backup)));
                options.extend(retention_args(&prune_spec.retention_policy));

                unlock(invoker.as_ref(), &host, repo, &repo_node).await;
                let req = InvokeRequest::new("forget", repo_node.clone()).args(options).env(repository_env(repo));
                match invoker.invoke(req).await {
                    Ok(_) => {
                        tracing::info!(component = "daemon", action = "prune", subaction = "prune_repository", backup = %backup.name, repository = %repo_name, status = "success", node = %repo_node, "repository pruned");
                    }
                    Err(e) => {
                        tracing::error!(component = "daemon", action = "prune", subaction = "prune_repository", backup = %backup.name, repository = %repo_name, status = "failure", node = %repo_node, error = %e, "prune failed");
                        all_ok = false;
                    }
                }
            }

            if all_ok {
                tracing::info!(component = "daemon", action = "prune", backup = %backup.name, status = "success", node = %node, "prune succeeded");
                Ok(())
            } else {
                tracing::error!(component = "daemon", action = "prune", backup = %backup.name, status = "failure", node = %node, "prune failed for one or more repositories");
                Err(TaskError::new("prune failed for one or more repositories"))
            }
        });
        self.manager.submit(task, priority, true);
    }

    /// Runs the before-hook (if any) and then every target repository's
    /// backup. `caller` lets a schedule or watch firing extend its own
    /// trace node instead of starting a fresh root.
    pub fn backup(&self, backup_name: &str, priority: Option<Priority>, caller: Option<TraceNode>) {
        let Some(backup) = self.config.backups.get(backup_name).cloned() else {
            tracing::warn!(component = "daemon", action = "backup", backup = backup_name, "unknown backup");
            return;
        };
        let priority = priority.unwrap_or(backup.priority);
        let repositories = self.config.repositories.clone();
        let host = self.config.host.clone();
        let invoker = self.invoker.clone();
        let hook_client = self.hook_client.clone();
        let root = caller.unwrap_or_else(|| TraceNode::root("Daemon-api"));
        let id = format!("backup_{backup_name}");
        let task = Task::new(id, priority, async move {
            let node = root.extend(format!("backup_{}", backup.name));
            tracing::info!(component = "daemon", action = "backup", backup = %backup.name, status = "starting", node = %node, "starting backup");

            let mut hook_ok = true;
            if let Some(hook) = &backup.before_hook {
                let hook_node = node.extend("hook");
                tracing::info!(component = "daemon", action = "backup", subaction = "run_hook", backup = %backup.name, status = "starting", node = %hook_node, "running before-backup hook");
                match crate::hooks::run_hook(hook, &hook_client).await {
                    Ok(()) => {
                        tracing::info!(component = "daemon", action = "backup", subaction = "run_hook", backup = %backup.name, status = "success", node = %hook_node, "hook succeeded");
                    }
                    Err(e) => {
                        tracing::error!(component = "daemon", action = "backup", subaction = "run_hook", backup = %backup.name, status = "failure", node = %hook_node, error = %e, "hook failed");
                        match hook.onfailure {
                            HookOnFailure::Stop => {
                                tracing::error!(component = "daemon", action = "backup", backup = %backup.name, status = "failure", node = %node, "backup aborted: before hook failed");
                                return Err(TaskError::new("before hook failed"));
                            }
                            HookOnFailure::Continue => hook_ok = false,
                            HookOnFailure::Ignore => {}
                        }
                    }
                }
            }

            let mut all_repo_ok = true;
            for repo_name in &backup.repositories {
                let Some(repo) = repositories.get(repo_name) else {
                    tracing::error!(component = "daemon", action = "backup", backup = %backup.name, repository = %repo_name, status = "failure", node = %node, "repository not found");
                    all_repo_ok = false;
                    continue;
                };
                let repo_node = node.extend(format!("repository_{repo_name}"));
                tracing::info!(component = "daemon", action = "backup", subaction = "backup_repository", backup = %backup.name, repository = %repo_name, status = "starting", node = %repo_node, "backing up to repository");

                let mut options = vec![
                    "--tag".to_string(),
                    shell_quote(&backup_tag(&backup.name)),
                    "--host".to_string(),
                    host.hostname.clone(),
                ];
                options.extend(global_opts(&host, Some(&backup)));
                options.extend(backup.paths.clone());
                for pattern in &backup.ignore_patterns {
                    options.push(format!("--exclude={}", shell_quote(pattern)));
                }

                unlock(invoker.as_ref(), &host, repo, &repo_node).await;
                let req = InvokeRequest::new("backup", repo_node.clone()).args(options).env(repository_env(repo));
                match invoker.invoke(req).await {
                    Ok(_) => {
                        tracing::info!(component = "daemon", action = "backup", subaction = "backup_repository", backup = %backup.name, repository = %repo_name, status = "success", node = %repo_node, "backup succeeded");
                    }
                    Err(e) => {
                        tracing::error!(component = "daemon", action = "backup", subaction = "backup_repository", backup = %backup.name, repository = %repo_name, status = "failure", node = %repo_node, error = %e, "backup failed");
                        all_repo_ok = false;
                    }
                }
            }

            if hook_ok && all_repo_ok {
                tracing::info!(component = "daemon", action = "backup", backup = %backup.name, status = "success", node = %node, "backup succeeded");
                Ok(())
            } else {
                tracing::error!(component = "daemon", action = "backup", backup = %backup.name, status = "failure", node = %node, "backup failed: hook or one or more repositories failed");
                Err(TaskError::new("backup failed"))
            }
        });
        self.manager.submit(task, priority, true);
    }

    /// Queued through the task manager (so it serializes against mutating
    /// operations on the same repositories) but awaited synchronously by
    /// the caller, unlike the fire-and-forget methods above.
    pub async fn list_snapshots(
        &self,
        repository: Option<String>,
        backup: Option<String>,
        sort: String,
        reverse: bool,
        priority: Priority,
    ) -> Result<Vec<SnapshotEntry>, DaemonError> {
        let repo_names = self.resolve_repo_set(repository.as_deref(), backup.as_deref())?;
        let repositories = self.config.repositories.clone();
        let host = self.config.host.clone();
        let invoker = self.invoker.clone();
        let (tx, rx) = tokio::sync::oneshot::channel();

        let task = Task::new("list_snapshots", priority, async move {
            let trace = TraceNode::root("Daemon-api").extend("list_snapshots");
            let result = run_list_snapshots(host, repositories, invoker, repo_names, backup, sort, reverse, trace).await;
            let ok = result.is_ok();
            let _ = tx.send(result);
            if ok {
                Ok(())
            } else {
                Err(TaskError::new("list_snapshots failed"))
            }
        });
        self.manager.submit(task, priority, false);

        rx.await.unwrap_or_else(|_| Err(DaemonError::Invalid("list_snapshots task dropped".to_string())))
    }

    /// Not queued: mirrors `original_source/daemon.py`'s synchronous,
    /// direct-to-engine `explain_snapshot`.
    pub async fn explain_snapshot(&self, repository: &str, snapshot: &str) -> Result<ExplainSnapshotResult, DaemonError> {
        let repo = self
            .config
            .repositories
            .get(repository)
            .ok_or_else(|| DaemonError::UnknownRepository(repository.to_string()))?;
        let trace = TraceNode::root("Daemon-api").extend("explain_snapshot");
        let req = InvokeRequest::new("ls", trace)
            .arg("--long")
            .arg(snapshot.to_string())
            .env(repository_env(repo))
            .json();
        let outcome = self.invoker.invoke(req).await?;
        let records: Vec<serde_json::Value> = serde_json::from_value(outcome.json.unwrap_or(serde_json::Value::Array(vec![])))
            .map_err(|e| DaemonError::Invalid(format!("parsing ls --long output: {e}")))?;

        let (head, rest) = records
            .split_first()
            .ok_or_else(|| DaemonError::Invalid("ls --long returned no records".to_string()))?;
        let backup_name = head
            .get("tags")
            .and_then(|t| t.as_array())
            .map(|tags| tags.iter().filter_map(|t| t.as_str()).map(str::to_string).collect::<Vec<_>>())
            .and_then(|tags| tag_to_backup_name(&tags));

        let objects = rest
            .iter()
            .cloned()
            .map(|mut obj| {
                if let serde_json::Value::Object(ref mut map) = obj {
                    map.insert("permissions".to_string(), serde_json::Value::String("unknown".to_string()));
                }
                obj
            })
            .collect();

        Ok(ExplainSnapshotResult {
            repository_name: repository.to_string(),
            backup_name,
            snapshot_id: snapshot.to_string(),
            objects,
        })
    }

    /// Not queued: a read of already-loaded configuration.
    pub fn get_config_summary(&self) -> ConfigSummary {
        let repositories = self
            .config
            .repositories
            .keys()
            .map(|name| (name.clone(), RepositorySummary::default()))
            .collect();
        let backups = self
            .config
            .backups
            .iter()
            .map(|(name, backup)| (name.clone(), BackupSummary { repositories: backup.repositories.clone() }))
            .collect();
        ConfigSummary { hostname: self.config.host.hostname.clone(), repositories, backups }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_list_snapshots(
    host: HostConfig,
    repositories: BTreeMap<String, Repository>,
    invoker: Arc<dyn EngineInvoker>,
    repo_names: Vec<String>,
    backup_name: Option<String>,
    sort: String,
    reverse: bool,
    trace: TraceNode,
) -> Result<Vec<SnapshotEntry>, DaemonError> {
    let mut rows = Vec::new();
    for repo_name in repo_names {
        let repo = repositories
            .get(&repo_name)
            .ok_or_else(|| DaemonError::UnknownRepository(repo_name.clone()))?;
        let repo_trace = trace.extend(format!("repository_{repo_name}"));
        unlock(invoker.as_ref(), &host, repo, &repo_trace).await;

        let mut args = Vec::new();
        if let Some(b) = &backup_name {
            args.push("--tag".to_string());
            args.push(backup_tag(b));
        }
        args.push("--host".to_string());
        args.push(host.hostname.clone());

        let req = InvokeRequest::new("snapshots", repo_trace).args(args).env(repository_env(repo)).json();
        let outcome = invoker.invoke(req).await?;
        let raw: Vec<RawSnapshot> = serde_json::from_value(outcome.json.unwrap_or(serde_json::Value::Array(vec![])))
            .map_err(|e| DaemonError::Invalid(format!("parsing snapshots output: {e}")))?;

        for snap in raw {
            rows.push(SnapshotEntry {
                date: snap.time,
                hostname: snap.hostname,
                backup: tag_to_backup_name(&snap.tags),
                repository: repo_name.clone(),
                id: snap.id,
            });
        }
    }

    sort_snapshots(&mut rows, &sort, reverse)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use snapd_adapters::fake::FakeInvoker;
    use snapd_config::load_from_str;

    const CONFIG: &str = r#"
        hostname = "myhost"

        [repositories.r1]
        location = "loc1"
        password = "pw1"

        [repositories.r2]
        location = "loc2"
        password = "pw2"

        [backups.nightly]
        paths = ["/data"]
        repositories = ["r1", "r2"]
    "#;

    fn snapshot_json(id: &str, time: &str, tags: &[&str]) -> serde_json::Value {
        json!({"id": id, "hostname": "myhost", "time": time, "tags": tags})
    }

    #[tokio::test]
    async fn list_snapshots_merges_and_sorts_across_repositories() {
        let loaded = load_from_str(CONFIG).unwrap();
        let invoker = FakeInvoker::new();
        invoker.push_response(Ok(snapd_adapters::InvokeOutcome {
            code: 0,
            stdout: String::new(),
            stderr: String::new(),
            json: Some(serde_json::Value::Array(vec![])),
        }));
        invoker.push_response(Ok(snapd_adapters::InvokeOutcome {
            code: 0,
            stdout: String::new(),
            stderr: String::new(),
            json: Some(serde_json::Value::Array(vec![snapshot_json("a1", "2026-01-01T00:00:00Z", &["backup-nightly"])])),
        }));
        invoker.push_response(Ok(snapd_adapters::InvokeOutcome {
            code: 0,
            stdout: String::new(),
            stderr: String::new(),
            json: Some(serde_json::Value::Array(vec![])),
        }));
        invoker.push_response(Ok(snapd_adapters::InvokeOutcome {
            code: 0,
            stdout: String::new(),
            stderr: String::new(),
            json: Some(serde_json::Value::Array(vec![snapshot_json("b1", "2026-01-02T00:00:00Z", &["backup-nightly"])])),
        }));

        let orchestrator = Orchestrator::new(loaded, Arc::new(invoker), ProcessRegistry::new());
        let rows = orchestrator
            .list_snapshots(None, None, "Date".to_string(), false, Priority::Immediate)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "a1");
        assert_eq!(rows[1].id, "b1");
    }

    #[tokio::test]
    async fn list_snapshots_unknown_repository_is_rejected() {
        let loaded = load_from_str(CONFIG).unwrap();
        let invoker = FakeInvoker::new();
        let orchestrator = Orchestrator::new(loaded, Arc::new(invoker), ProcessRegistry::new());
        let err = orchestrator
            .list_snapshots(Some("nope".to_string()), None, "Date".to_string(), false, Priority::Immediate)
            .await
            .unwrap_err();
        assert!(matches!(err, DaemonError::UnknownRepository(_)));
    }

    #[tokio::test]
    async fn explain_snapshot_marks_first_record_as_metadata() {
        let loaded = load_from_str(CONFIG).unwrap();
        let invoker = FakeInvoker::new();
        invoker.push_response(Ok(snapd_adapters::InvokeOutcome {
            code: 0,
            stdout: String::new(),
            stderr: String::new(),
            json: Some(serde_json::Value::Array(vec![
                snapshot_json("snap1", "2026-01-01T00:00:00Z", &["backup-nightly"]),
                json!({"path": "/data/a", "type": "file", "permissions": "drwxr-xr-x"}),
            ])),
        }));
        let orchestrator = Orchestrator::new(loaded, Arc::new(invoker), ProcessRegistry::new());
        let result = orchestrator.explain_snapshot("r1", "snap1").await.unwrap();
        assert_eq!(result.backup_name.as_deref(), Some("nightly"));
        assert_eq!(result.objects.len(), 1);
        assert_eq!(result.objects[0]["permissions"], json!("unknown"));
    }

    #[tokio::test]
    async fn backup_is_success_only_when_hook_and_every_repository_succeed() {
        let loaded = load_from_str(CONFIG).unwrap();
        let invoker = FakeInvoker::new();
        invoker.push_response(Ok(snapd_adapters::InvokeOutcome { code: 0, stdout: String::new(), stderr: String::new(), json: None }));
        invoker.push_response(Ok(snapd_adapters::InvokeOutcome { code: 0, stdout: String::new(), stderr: String::new(), json: None }));
        invoker.push_response(Err(EngineError { code: 1, stdout: String::new(), stderr: "boom".to_string() }));
        invoker.push_response(Ok(snapd_adapters::InvokeOutcome { code: 0, stdout: String::new(), stderr: String::new(), json: None }));

        let orchestrator = Orchestrator::new(loaded, Arc::new(invoker), ProcessRegistry::new());
        orchestrator.manager.start();
        orchestrator.backup("nightly", Some(Priority::Immediate), None);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        orchestrator.manager.stop().await;
    }

    #[test]
    fn retention_args_maps_every_field() {
        let policy = RetentionPolicy {
            nb_of_hourly: Some(1),
            nb_of_daily: Some(7),
            nb_of_weekly: Some(4),
            nb_of_monthly: Some(12),
            nb_of_yearly: Some(2),
            min_time: Some("2024-01-01".to_string()),
        };
        let args = retention_args(&policy);
        assert_eq!(
            args,
            vec![
                "--keep-hourly", "1", "--keep-daily", "7", "--keep-weekly", "4", "--keep-monthly", "12",
                "--keep-yearly", "2", "--keep-within", "2024-01-01",
            ]
        );
    }

    #[test]
    fn global_opts_prefers_backup_override_over_host_default() {
        let host = HostConfig { hostname: "h".to_string(), upload_limit_kib: Some(100), download_limit_kib: None, log_level: "info".to_string(), api: None };
        let backup = Backup {
            name: "b".to_string(),
            paths: vec![],
            ignore_patterns: vec![],
            repositories: vec![],
            schedules: vec![],
            watch: None,
            prune: None,
            before_hook: None,
            bandwidth_upload_kib: Some(50),
            bandwidth_download_kib: None,
            priority: Priority::Normal,
        };
        let opts = global_opts(&host, Some(&backup));
        assert_eq!(opts, vec!["--limit-upload", "50"]);
    }

    #[test]
    fn sort_snapshots_reverse_is_exact_reverse_of_ascending() {
        let mut rows = vec![
            SnapshotEntry { date: "2".to_string(), hostname: "h".to_string(), backup: None, repository: "r".to_string(), id: "2".to_string() },
            SnapshotEntry { date: "1".to_string(), hostname: "h".to_string(), backup: None, repository: "r".to_string(), id: "1".to_string() },
        ];
        sort_snapshots(&mut rows, "Date", false).unwrap();
        let ascending: Vec<_> = rows.iter().map(|r| r.id.clone()).collect();
        sort_snapshots(&mut rows, "Date", false).unwrap();
        sort_snapshots(&mut rows, "Date", true).unwrap();
        let reversed: Vec<_> = rows.iter().map(|r| r.id.clone()).collect();
        let mut expected = ascending.clone();
        expected.reverse();
        assert_eq!(reversed, expected);
    }

    #[test]
    fn unknown_sort_column_is_rejected() {
        let mut rows: Vec<SnapshotEntry> = Vec::new();
        let err = sort_snapshots(&mut rows, "Bogus", false).unwrap_err();
        assert!(matches!(err, DaemonError::Invalid(_)));
    }

    #[test]
    fn config_summary_reflects_loaded_backups_and_repositories() {
        let loaded = load_from_str(CONFIG).unwrap();
        let invoker = FakeInvoker::new();
        let orchestrator = Orchestrator::new(loaded, Arc::new(invoker), ProcessRegistry::new());
        let summary = orchestrator.get_config_summary();
        assert_eq!(summary.hostname, "myhost");
        assert!(summary.repositories.contains_key("r1"));
        assert_eq!(summary.backups["nightly"].repositories, vec!["r1", "r2"]);
    }
}
