// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle (C9): load configuration, install the redacting logger,
//! wire up the orchestrator and optional Control API, then block until a
//! termination signal arrives and tear everything down in reverse order.

use crate::api::{self, ApiHandle};
use crate::orchestrator::Orchestrator;
use snapd_adapters::{ProcessRegistry, ResticInvoker};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("failed to load config at {path}: {source}")]
    Config { path: PathBuf, #[source] source: snapd_core::ConfigError },
    #[error(transparent)]
    Daemon(#[from] crate::DaemonError),
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

/// Loads `config_path`, starts the orchestrator and (if configured) the
/// Control API, then waits for SIGINT/SIGTERM before shutting everything
/// down. Returns once shutdown has completed.
pub async fn run(config_path: &std::path::Path) -> Result<(), LifecycleError> {
    let config = snapd_config::load_from_path(config_path)
        .map_err(|source| LifecycleError::Config { path: config_path.to_path_buf(), source })?;

    crate::logging::init(&config.host.log_level);

    info!(component = "lifecycle", action = "startup", hostname = %config.host.hostname, "starting daemon");

    let registry = ProcessRegistry::new();
    let invoker = Arc::new(ResticInvoker::new(registry.clone()));
    let api_config = config.host.api.clone();
    let orchestrator = Orchestrator::new(config, invoker, registry);
    orchestrator.start()?;

    let api_handle: Option<ApiHandle> = api_config.map(|api_cfg| {
        info!(component = "lifecycle", action = "startup", port = api_cfg.port, "starting control api");
        api::serve(orchestrator.clone(), api_cfg.port, api_cfg.credentials)
    });

    wait_for_shutdown_signal().await.map_err(LifecycleError::Signal)?;

    info!(component = "lifecycle", action = "shutdown", "shutdown signal received");
    if let Some(handle) = api_handle {
        handle.stop().await;
    }
    orchestrator.stop().await;
    info!(component = "lifecycle", action = "shutdown", status = "success", "daemon shutdown complete");

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_config_path_surfaces_as_config_error() {
        let err = run(std::path::Path::new("/nonexistent/snapd.toml")).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Config { .. }));
    }
}
