// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `snapctl` - a thin Control API client, mirroring
//! `original_source/client-cli.py`'s five subcommands over the daemon's
//! JSON-RPC 2.0 endpoint instead of an RPyC connection.

use anyhow::{anyhow, bail, Result};
use base64::Engine;
use clap::{Parser, Subcommand, ValueEnum};
use snapd_core::Priority;
use snapd_wire::{
    BackupParams, CheckRepositoryParams, ExplainSnapshotParams, JsonRpcRequest, JsonRpcResponse,
    ListSnapshotsParams, Method, PruneParams, RestoreSnapshotParams,
};

#[derive(Parser)]
#[command(name = "snapctl", version = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH")), about = "Backup orchestrator control client")]
struct Cli {
    /// Daemon host
    #[arg(long, default_value = "localhost", global = true)]
    host: String,

    /// Control API port
    #[arg(short = 'P', long, default_value_t = 8080, global = true)]
    port: u16,

    /// Basic auth username
    #[arg(short = 'u', long, env = "SNAPCTL_USERNAME", global = true)]
    username: String,

    /// Basic auth password
    #[arg(short = 'w', long, env = "SNAPCTL_PASSWORD", global = true)]
    password: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PriorityArg {
    Normal,
    Next,
    Immediate,
}

impl From<PriorityArg> for Priority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Normal => Priority::Normal,
            PriorityArg::Next => Priority::Next,
            PriorityArg::Immediate => Priority::Immediate,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List snapshots across one or every repository
    #[command(name = "list-snapshots")]
    ListSnapshots {
        #[arg(short, long)]
        repository: Option<String>,
        #[arg(short, long)]
        backup: Option<String>,
        #[arg(short, long, default_value = "Date")]
        sort: String,
        #[arg(short = 'n', long)]
        reverse: bool,
    },
    /// Restore a snapshot into a repository
    #[command(name = "restore-snapshot")]
    RestoreSnapshot {
        repository: String,
        snapshot: String,
        #[arg(short = 'd', long)]
        target_path: Option<String>,
        #[arg(short, long, value_enum, default_value = "normal")]
        priority: PriorityArg,
    },
    /// Request a repository integrity check
    #[command(name = "check-repository")]
    CheckRepository {
        repository: String,
        #[arg(short, long, value_enum, default_value = "normal")]
        priority: PriorityArg,
    },
    /// Trigger a backup run
    Backup {
        backup: String,
        #[arg(short, long, value_enum, default_value = "normal")]
        priority: PriorityArg,
    },
    /// Trigger a prune (forget) run
    Prune {
        backup: String,
        #[arg(short, long, value_enum, default_value = "normal")]
        priority: PriorityArg,
    },
    /// Show what a snapshot contains
    #[command(name = "explain-snapshot")]
    ExplainSnapshot { repository: String, snapshot: String },
    /// Print the daemon's loaded configuration summary
    #[command(name = "config-summary")]
    ConfigSummary,
}

struct Client {
    base_url: String,
    auth_header: String,
    http: reqwest::Client,
}

impl Client {
    fn new(host: &str, port: u16, username: &str, password: &str) -> Self {
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        Self {
            base_url: format!("http://{host}:{port}/"),
            auth_header: format!("Basic {token}"),
            http: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: Method, params: serde_json::Value) -> Result<serde_json::Value> {
        let request = JsonRpcRequest {
            jsonrpc: snapd_wire::JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id: serde_json::json!(1),
        };

        let response = self
            .http
            .post(&self.base_url)
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body: JsonRpcResponse = response.json().await?;
        match body {
            JsonRpcResponse::Success { result, .. } => Ok(result),
            JsonRpcResponse::Error { error, .. } => {
                bail!("{method} failed ({status}): {} ({})", error.message, error.code)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new(&cli.host, cli.port, &cli.username, &cli.password);

    match cli.command {
        Command::ListSnapshots { repository, backup, sort, reverse } => {
            let params = ListSnapshotsParams {
                repository_name: repository.map(|v| v.to_lowercase()),
                backup_name: backup.map(|v| v.to_lowercase()),
                sort,
                reverse,
                priority: None,
            };
            let value = client.call(Method::ListSnapshots, serde_json::to_value(params)?).await?;
            print_table(&value)?;
        }
        Command::RestoreSnapshot { repository, snapshot, target_path, priority } => {
            let params = RestoreSnapshotParams {
                repository_name: repository.to_lowercase(),
                snapshot,
                target_path,
                priority: Some(priority.into()),
            };
            client.call(Method::RestoreSnapshot, serde_json::to_value(params)?).await?;
            println!("Restore requested");
        }
        Command::CheckRepository { repository, priority } => {
            let params = CheckRepositoryParams { repository_name: repository.to_lowercase(), priority: Some(priority.into()) };
            client.call(Method::CheckRepository, serde_json::to_value(params)?).await?;
            println!("Check requested");
        }
        Command::Backup { backup, priority } => {
            let params = BackupParams { backup_name: backup.to_lowercase(), priority: Some(priority.into()) };
            client.call(Method::Backup, serde_json::to_value(params)?).await?;
            println!("Backup requested");
        }
        Command::Prune { backup, priority } => {
            let params = PruneParams { backup_name: backup.to_lowercase(), priority: Some(priority.into()) };
            client.call(Method::Prune, serde_json::to_value(params)?).await?;
            println!("Prune requested");
        }
        Command::ExplainSnapshot { repository, snapshot } => {
            let params = ExplainSnapshotParams {
                repository_name: repository.to_lowercase(),
                snapshot_id: snapshot,
                priority: None,
            };
            let value = client.call(Method::ExplainSnapshot, serde_json::to_value(params)?).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::ConfigSummary => {
            let value = client.call(Method::GetConfigSummary, serde_json::Value::Null).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}

fn print_table(value: &serde_json::Value) -> Result<()> {
    let rows = value.as_array().ok_or_else(|| anyhow!("expected an array of snapshots"))?;
    if rows.is_empty() {
        println!("No snapshots");
        return Ok(());
    }

    let columns = ["Date", "Hostname", "Backup", "Repository", "Id"];
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| row.get(c).map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())).unwrap_or_default())
            .collect();
        println!("{}", cells.join(" | "));
    }
    Ok(())
}
