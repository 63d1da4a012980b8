// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `snapd` - the backup orchestrator daemon entrypoint.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "snapd", version, about = "Backup orchestrator daemon")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short = 'c', long, default_value = "/etc/snapd/snapd.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match snapd_daemon::run(&cli.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("snapd: {e}");
            ExitCode::FAILURE
        }
    }
}
