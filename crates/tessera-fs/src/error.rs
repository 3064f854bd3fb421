// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for module descriptors

use std::path::PathBuf;
use tessera_core::{ModuleError, ModuleIdentifier};
use thiserror::Error;

/// Result type for descriptor operations
pub type Result<T> = std::result::Result<T, DescriptorError>;

/// Errors reading or interpreting a `module.toml`
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// Descriptor could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// Descriptor path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Descriptor is not valid TOML for the expected schema
    #[error("Invalid descriptor {}: {source}", path.display())]
    Parse {
        /// Descriptor path
        path: PathBuf,
        /// Parser error
        #[source]
        source: toml::de::Error,
    },

    /// Descriptor could not be serialized
    #[error("Failed to serialize descriptor: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Descriptor parsed but describes an unusable module
    #[error("Invalid descriptor {}: {reason}", path.display())]
    Invalid {
        /// Descriptor path
        path: PathBuf,
        /// Reason for rejection
        reason: String,
    },

    /// Descriptor contents were rejected by the module model
    #[error(transparent)]
    Module(#[from] ModuleError),
}

impl DescriptorError {
    /// Convert into the error a module finder reports for `module`
    pub fn into_module_error(self, module: &ModuleIdentifier) -> ModuleError {
        match self {
            Self::Io { source, .. } => ModuleError::Finder {
                module: module.clone(),
                source,
            },
            Self::Module(err) => err,
            other => ModuleError::invalid_spec(module, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_becomes_finder_error() {
        let err = DescriptorError::Io {
            path: PathBuf::from("repo/app/main/module.toml"),
            source: std::io::Error::other("disk on fire"),
        };
        let converted = err.into_module_error(&ModuleIdentifier::named("app"));
        assert!(matches!(converted, ModuleError::Finder { .. }));
        assert!(converted.is_retryable());
    }

    #[test]
    fn test_invalid_becomes_invalid_spec() {
        let err = DescriptorError::Invalid {
            path: PathBuf::from("module.toml"),
            reason: "no resources".into(),
        };
        let converted = err.into_module_error(&ModuleIdentifier::named("app"));
        assert!(
            matches!(converted, ModuleError::InvalidSpec { ref reason, .. } if reason.contains("no resources"))
        );
    }
}
