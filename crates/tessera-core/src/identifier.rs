// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module identifiers

use crate::error::{ModuleError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Name of a module: `group:artifact[:version]`, or a bare name.
///
/// Components are reference counted, so cloning an identifier is cheap.
/// Equality and hashing compare every component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleIdentifier {
    group: Arc<str>,
    artifact: Arc<str>,
    version: Option<Arc<str>>,
}

impl ModuleIdentifier {
    /// Create an identifier from its components
    pub fn new(group: &str, artifact: &str, version: Option<&str>) -> Self {
        Self {
            group: Arc::from(group),
            artifact: Arc::from(artifact),
            version: version.map(Arc::from),
        }
    }

    /// Create a bare identifier with no group and no version
    pub fn named(name: &str) -> Self {
        Self::new("", name, None)
    }

    /// Group component (empty for bare names)
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Artifact component
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// Version component
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl fmt::Display for ModuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.artifact)?;
        } else {
            write!(f, "{}:{}", self.group, self.artifact)?;
        }
        if let Some(version) = &self.version {
            write!(f, ":{}", version)?;
        }
        Ok(())
    }
}

impl FromStr for ModuleIdentifier {
    type Err = ModuleError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.iter().any(|p| p.trim().is_empty() || p.trim() != *p) {
            return Err(ModuleError::InvalidIdentifier(s.to_string()));
        }

        match parts.as_slice() {
            [name] => Ok(Self::named(name)),
            [group, artifact] => Ok(Self::new(group, artifact, None)),
            [group, artifact, version] => Ok(Self::new(group, artifact, Some(version))),
            _ => Err(ModuleError::InvalidIdentifier(s.to_string())),
        }
    }
}

impl Serialize for ModuleIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModuleIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
