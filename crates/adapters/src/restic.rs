// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::registry::ProcessRegistry;
use crate::{EngineInvoker, InvokeOutcome, InvokeRequest};
use async_trait::async_trait;
use snapd_core::EngineError;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::info;

/// Caps each of stdout/stderr at this many retained lines; the oldest
/// lines are dropped on overflow so a chatty engine invocation can't grow
/// the daemon's memory unbounded.
const MAX_RETAINED_LINES: usize = 4096;

/// Default invoker: spawns the real `restic` binary.
pub struct ResticInvoker {
    binary: String,
    registry: ProcessRegistry,
}

impl ResticInvoker {
    pub fn new(registry: ProcessRegistry) -> Self {
        Self { binary: "restic".to_string(), registry }
    }

    /// Override the binary path/name (used in tests against a stub script).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

struct BoundedLines {
    lines: Vec<String>,
    truncated: bool,
}

impl BoundedLines {
    fn new() -> Self {
        Self { lines: Vec::new(), truncated: false }
    }

    fn push(&mut self, line: String) {
        if self.lines.len() >= MAX_RETAINED_LINES {
            self.lines.remove(0);
            self.truncated = true;
        }
        self.lines.push(line);
    }

    fn joined(&self) -> String {
        self.lines.join("\n")
    }
}

async fn drain<R>(
    reader: R,
    channel: &'static str,
    node: String,
) -> BoundedLines
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut out = BoundedLines::new();
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.is_empty() {
            continue;
        }
        info!(
            component = "engine",
            action = "invoke",
            subaction = "receive_output",
            channel,
            node = %node,
            "{}", line
        );
        out.push(line);
    }
    if out.truncated {
        info!(component = "engine", action = "invoke", channel, node = %node, "output truncated, keeping last {MAX_RETAINED_LINES} lines");
    }
    out
}

#[async_trait]
impl EngineInvoker for ResticInvoker {
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeOutcome, EngineError> {
        let node = request.trace.to_string();
        let mut argv = vec![request.cmd.clone()];
        argv.extend(request.args.iter().cloned());
        if request.json_out {
            argv.push("--json".to_string());
        }

        let mut command = Command::new(&self.binary);
        command
            .args(&argv)
            .envs(request.env.iter())
            .env("RESTIC_CACHE_DIR", "/tmp")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(component = "engine", action = "invoke", status = "starting", node = %node, "start restic {}", argv.join(" "));

        let mut child = command.spawn().map_err(|e| EngineError {
            code: -1,
            stdout: String::new(),
            stderr: format!("failed to spawn restic: {e}"),
        })?;

        let pid = child.id();
        if let Some(pid) = pid {
            self.registry.register(pid);
        }

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                return Err(EngineError {
                    code: -1,
                    stdout: String::new(),
                    stderr: "restic child missing piped stdio".to_string(),
                })
            }
        };

        let stdout_node = node.clone();
        let stderr_node = node.clone();
        let stdout_task = tokio::spawn(drain(stdout, "stdout", stdout_node));
        let stderr_task = tokio::spawn(drain(stderr, "stderr", stderr_node));

        let status = child.wait().await;

        if let Some(pid) = pid {
            self.registry.deregister(pid);
        }

        let out = stdout_task.await.unwrap_or_else(|_| BoundedLines::new());
        let err = stderr_task.await.unwrap_or_else(|_| BoundedLines::new());
        let stdout_text = out.joined();
        let stderr_text = err.joined();

        let status = status.map_err(|e| EngineError {
            code: -1,
            stdout: stdout_text.clone(),
            stderr: format!("failed to wait on restic: {e}"),
        })?;
        let code = status.code().unwrap_or(-1);

        info!(component = "engine", action = "invoke", status = if code == 0 { "success" } else { "failure" }, node = %node, "exit {code}");

        if code != 0 {
            return Err(EngineError { code, stdout: stdout_text, stderr: stderr_text });
        }

        let json = if request.json_out {
            Some(serde_json::from_str(&stdout_text).map_err(|e| EngineError {
                code,
                stdout: stdout_text.clone(),
                stderr: format!("failed to parse json stdout: {e}"),
            })?)
        } else {
            None
        };

        Ok(InvokeOutcome { code, stdout: stdout_text, stderr: stderr_text, json })
    }
}
