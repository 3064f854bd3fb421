// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Configuration for the tessera CLI.
//!
//! Sources are merged in order, later ones winning key by key:
//!
//! 1. `<config dir>/tessera/config.toml`
//! 2. `./tessera.toml`
//! 3. the file passed with `--config`
//! 4. `TESSERA_REPOSITORY` and `TESSERA_LOADER_MODE`

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tessera_core::{LoaderMode, RegistryConfig};

/// Project-local config file name
pub const PROJECT_CONFIG: &str = "tessera.toml";

/// Configuration for the tessera CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CliConfig {
    /// Module repositories, searched in order
    pub repositories: Vec<PathBuf>,

    /// Registry settings
    pub registry: RegistryConfig,
}

impl CliConfig {
    /// Load configuration from the default locations plus `explicit`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut merged = toml::Table::new();

        if let Some(path) = global_config_path() {
            if path.exists() {
                merge_tables(&mut merged, read_table(&path)?);
            }
        }

        let project = PathBuf::from(PROJECT_CONFIG);
        if project.exists() {
            merge_tables(&mut merged, read_table(&project)?);
        }

        if let Some(path) = explicit {
            merge_tables(&mut merged, read_table(path)?);
        }

        let mut config: CliConfig = toml::Value::Table(merged)
            .try_into()
            .context("invalid tessera configuration")?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(paths) = lookup("TESSERA_REPOSITORY") {
            self.repositories = std::env::split_paths(&paths).collect();
        }

        if let Some(mode) = lookup("TESSERA_LOADER_MODE") {
            self.registry.loader_mode = match mode.trim() {
                "serialized" => LoaderMode::Serialized,
                "parallel" => LoaderMode::Parallel,
                other => bail!("TESSERA_LOADER_MODE must be 'serialized' or 'parallel', got '{other}'"),
            };
        }

        Ok(())
    }
}

/// Get the global config file path.
fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tessera").join("config.toml"))
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    content
        .parse::<toml::Table>()
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

/// Overlay `overlay` onto `base`, merging nested tables key by key.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, incoming);
                    continue;
                }
                base.insert(key, toml::Value::Table(incoming));
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}
