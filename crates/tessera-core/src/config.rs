// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Registry configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a module's loader runs artifact lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoaderMode {
    /// One worker thread per loader serves queued requests in order
    #[default]
    Serialized,
    /// Lookups run on the calling thread; concurrent first loads race and the
    /// first published result wins
    Parallel,
}

/// What a re-entrant request for a module still being defined gets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CyclePolicy {
    /// The partially built module; its wires are complete once the outermost
    /// load returns
    #[default]
    Tolerate,
    /// A `CircularDependency` error
    FailFast,
}

/// Configuration for a [`ModuleRegistry`](crate::ModuleRegistry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RegistryConfig {
    /// Loader execution mode
    pub loader_mode: LoaderMode,
    /// Import cycle handling
    pub cycle_policy: CyclePolicy,
    /// Prefix of loader worker thread names
    pub worker_name_prefix: String,
    /// Wait bound applied by `Module::load_artifact`, in milliseconds
    pub default_timeout_ms: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            loader_mode: LoaderMode::default(),
            cycle_policy: CyclePolicy::default(),
            worker_name_prefix: "tessera-loader".to_string(),
            default_timeout_ms: None,
        }
    }
}

impl RegistryConfig {
    /// Default wait bound as a duration
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }
}
