// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! snapd-config: loads and validates a TOML configuration file into the
//! `snapd-core` domain model. Mirrors `original_source/main.py`'s
//! `load_config`/`format` pass: lowercase every entity name, flatten
//! provider credentials into environment variables, resolve backup ->
//! repository references, and reject anything the domain model can't
//! represent (unknown retention keys, dangling references, bad units).

mod raw;

use snapd_core::{Backup, ConfigError, HostConfig, Repository};
use std::collections::BTreeMap;
use std::path::Path;

/// A fully validated, loaded configuration: the host settings plus the
/// repository and backup maps, keyed by their (already-lowercased) names.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub host: HostConfig,
    pub repositories: BTreeMap<String, Repository>,
    pub backups: BTreeMap<String, Backup>,
}

/// Reads and parses the TOML file at `path`, then validates it.
pub fn load_from_path(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("reading {}: {e}", path.display())))?;
    load_from_str(&text)
}

/// Parses and validates a TOML document already read into memory.
pub fn load_from_str(text: &str) -> Result<LoadedConfig, ConfigError> {
    let raw: raw::RawConfig =
        toml::from_str(text).map_err(|e| ConfigError::Invalid(format!("parsing config: {e}")))?;
    raw::transform(raw)
}
