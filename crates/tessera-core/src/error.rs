// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for module resolution and artifact loading

use crate::identifier::ModuleIdentifier;
use std::time::Duration;
use thiserror::Error;

/// Result type for module runtime operations
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Errors that can occur while resolving modules or loading artifacts
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The module finder has no specification for the identifier
    #[error("Cannot find module '{0}'")]
    ModuleNotFound(ModuleIdentifier),

    /// A live module with this identifier is already defined
    #[error("Module '{0}' is already defined")]
    ModuleAlreadyExists(ModuleIdentifier),

    /// A required import could not be satisfied
    #[error("Failed to resolve module '{module}': {reason}")]
    ResolutionFailed {
        /// Module being defined
        module: ModuleIdentifier,
        /// Reason for failure
        reason: String,
    },

    /// A module was requested while it was still being defined
    #[error("Circular dependency detected: {}", format_cycle(.0))]
    CircularDependency(Vec<ModuleIdentifier>),

    /// A required artifact does not exist in the module or its imports
    #[error("Artifact '{name}' not found from module '{module}'")]
    ArtifactNotFound {
        /// Module that was asked
        module: ModuleIdentifier,
        /// Artifact name
        name: String,
    },

    /// A resource backend failed while reading
    #[error("I/O error reading '{name}' from root '{root}' of module '{module}': {source}")]
    BackendIo {
        /// Module owning the root
        module: ModuleIdentifier,
        /// Resource root name
        root: String,
        /// Artifact or resource name
        name: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// An artifact would be defined into a package sealed by another root
    #[error("Sealing violation in module '{module}': package '{package}' is sealed to root '{sealed_root}', refused '{name}' from '{root}'")]
    SealingViolation {
        /// Module defining the artifact
        module: ModuleIdentifier,
        /// Package of the artifact
        package: String,
        /// Root the package is bound to
        sealed_root: String,
        /// Root that offered the artifact
        root: String,
        /// Artifact name
        name: String,
    },

    /// A bounded wait for a queued load expired
    #[error("Loading '{name}' from module '{module}' timed out after {timeout:?}")]
    Timeout {
        /// Module that was asked
        module: ModuleIdentifier,
        /// Artifact name
        name: String,
        /// Time waited
        timeout: Duration,
    },

    /// A loader worker panicked while resolving a request
    #[error("Loader worker for module '{module}' panicked while loading '{name}'")]
    WorkerPanicked {
        /// Module that was asked
        module: ModuleIdentifier,
        /// Artifact name
        name: String,
    },

    /// A loader worker thread could not be started
    #[error("Failed to start loader worker for module '{module}': {source}")]
    WorkerSpawn {
        /// Module owning the loader
        module: ModuleIdentifier,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The loader worker is gone and can no longer accept requests
    #[error("Loader for module '{0}' is closed")]
    LoaderClosed(ModuleIdentifier),

    /// The module declares no main entry point
    #[error("Module '{0}' has no main entry point")]
    NoMainEntry(ModuleIdentifier),

    /// Text could not be parsed as a module identifier
    #[error("Invalid module identifier '{0}'")]
    InvalidIdentifier(String),

    /// An export or import pattern is not a valid glob
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Offending pattern
        pattern: String,
        /// Parser message
        reason: String,
    },

    /// A module specification is malformed
    #[error("Invalid specification for module '{module}': {reason}")]
    InvalidSpec {
        /// Module named by the specification
        module: String,
        /// Reason for rejection
        reason: String,
    },

    /// The module finder failed while looking for a specification
    #[error("Finder error for module '{module}': {source}")]
    Finder {
        /// Module being looked up
        module: ModuleIdentifier,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl ModuleError {
    /// Create a resolution failure
    pub fn resolution_failed(module: &ModuleIdentifier, reason: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            module: module.clone(),
            reason: reason.into(),
        }
    }

    /// Create an invalid specification error
    pub fn invalid_spec(module: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            module: module.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BackendIo { .. } | Self::Timeout { .. } | Self::Finder { .. }
        )
    }
}

fn format_cycle(path: &[ModuleIdentifier]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
